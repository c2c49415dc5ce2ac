//! Building the module initializer.
//!
//! The initializer is a type constructor (`.cctor`) on `<Module>`: the runtime runs it
//! before any other code of the module, which makes it a hook for work that has to happen
//! when the assembly is loaded.

use log::info;

use crate::{
    disassembler::decode_stream,
    file::{io::push_le, parser::Parser},
    image::{Image, MethodRecord, MethodRef},
    metadata::{
        method::{MethodBody, MethodModifiers},
        signatures::parse_method_signature,
    },
    Error, Result,
};

/// Name of type constructors
pub const CCTOR_NAME: &str = ".cctor";

/// `static void ()`
pub const CCTOR_SIGNATURE: [u8; 3] = [0x00, 0x00, 0x01];

/// Max stack of the synthesized body
const CCTOR_MAX_STACK: u16 = 8;

const OPCODE_CALL: u8 = 0x28;
const OPCODE_RET: u8 = 0x2A;

/// Attributes of the synthesized method: static, special name, runtime special name
#[must_use]
pub fn cctor_flags() -> MethodModifiers {
    MethodModifiers::STATIC | MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME
}

/// Add a `<Module>.cctor` that calls `target` to `image`.
///
/// `target` may come from another image; it is looked up again by name (see
/// [`Image::rebase`]). Injecting twice adds two initializers.
///
/// # Errors
/// - [`Error::NoModuleType`] if the image has no `<Module>` type
/// - [`Error::MethodNotFound`] if `target` does not exist in `image`
/// - [`Error::NotSupported`] if `target` was itself added after reading
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
///
/// let mut image = modinit::read(Path::new("Library.dll"))?;
/// let target = modinit::resolve(&image, "ModuleInitializer", "Run")?;
/// modinit::inject(&mut image, &target)?;
/// modinit::write(&image, Path::new("Library.dll"), None)?;
/// # Ok::<(), modinit::Error>(())
/// ```
pub fn inject(image: &mut Image, target: &MethodRef) -> Result<()> {
    let Some(module) = image.module_type_id() else {
        return Err(Error::NoModuleType);
    };

    let target = image.rebase(target)?;
    let Some(token) = image.method_token(target.method()) else {
        return Err(Error::NotSupported(format!(
            "{}::{} was added in this session and has no token yet",
            target.type_name(),
            target.method_name()
        )));
    };

    let mut code = Vec::with_capacity(6);
    code.push(OPCODE_CALL);
    push_le(&mut code, token.value());
    code.push(OPCODE_RET);

    let encoded = MethodBody::encode(&code, CCTOR_MAX_STACK)?;
    let body = MethodBody::from(&encoded)?;
    let instructions = decode_stream(&mut Parser::new(&code), body.size_header as u64)?;

    let method = MethodRecord {
        rid: None,
        name: CCTOR_NAME.to_string(),
        rva: 0,
        flags: cctor_flags().bits(),
        impl_flags: 0,
        signature: parse_method_signature(&CCTOR_SIGNATURE)?,
        return_type: "System.Void".to_string(),
        params: Vec::new(),
        body: Some(body),
        instructions,
        encoded_body: Some(encoded),
        encoded_signature: Some(CCTOR_SIGNATURE.to_vec()),
    };

    image.add_method(module, method)?;
    info!(
        "Injected <Module>.cctor calling {}::{} ({})",
        target.type_name(),
        target.method_name(),
        token
    );

    Ok(())
}
