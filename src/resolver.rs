//! Locating and validating the initializer target.

use log::debug;

use crate::{
    image::{Image, MethodRef},
    metadata::method::MethodAccessFlags,
    Error, Result,
};

/// Return type every initializer target must have
const VOID: &str = "System.Void";

/// Find `method_name` on the first type named `type_name` and check that it can be called
/// from a module initializer.
///
/// `type_name` is the simple name of the type, without namespace. The checks run in this
/// order, the first failing one is reported:
///
/// 1. the type exists ([`Error::TypeNotFound`])
/// 2. the method exists ([`Error::MethodNotFound`])
/// 3. it takes no parameters ([`Error::InvalidSignature`])
/// 4. it is neither private nor protected ([`Error::InvalidVisibility`])
/// 5. it returns `void` ([`Error::InvalidReturnType`])
/// 6. it is static ([`Error::NotStatic`])
///
/// # Errors
/// See above.
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
///
/// let image = modinit::read(Path::new("Library.dll"))?;
/// let target = modinit::resolve(&image, "ModuleInitializer", "Run")?;
/// println!("{}::{}", target.type_name(), target.method_name());
/// # Ok::<(), modinit::Error>(())
/// ```
pub fn resolve(image: &Image, type_name: &str, method_name: &str) -> Result<MethodRef> {
    let Some((_, ty)) = image.find_type(type_name) else {
        return Err(Error::TypeNotFound(type_name.to_string()));
    };

    let Some((id, method)) = image.find_method(ty, method_name) else {
        return Err(Error::MethodNotFound {
            type_name: type_name.to_string(),
            method: method_name.to_string(),
        });
    };

    if !method.params.is_empty() {
        return Err(Error::InvalidSignature(method_name.to_string()));
    }

    let access = method.access();
    if access == MethodAccessFlags::PRIVATE || access == MethodAccessFlags::FAMILY {
        return Err(Error::InvalidVisibility(method_name.to_string()));
    }

    if method.return_type != VOID {
        return Err(Error::InvalidReturnType {
            method: method_name.to_string(),
            found: method.return_type.clone(),
        });
    }

    if !method.is_static() {
        return Err(Error::NotStatic(method_name.to_string()));
    }

    debug!(
        "Resolved {}::{} ({} method)",
        ty.full_name(),
        method.name,
        access.keyword()
    );

    image
        .method_ref(ty, id)
        .ok_or_else(|| Error::MethodNotFound {
            type_name: type_name.to_string(),
            method: method_name.to_string(),
        })
}
