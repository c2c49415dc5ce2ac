#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use modinit::{disassembler::Operand, metadata::token::Token, Image, MethodRecord};

#[path = "../../src/test/fixture.rs"]
pub mod fixture;

use fixture::ImageFixture;

/// Write the image (and PDB, if the fixture has one) as `<dir>/<name>.dll`.
pub fn write_fixture(dir: &Path, name: &str, fixture: &ImageFixture) -> PathBuf {
    let output = fixture.build_all();
    let path = dir.join(format!("{name}.dll"));
    fs::write(&path, &output.image).unwrap();
    if let Some(pdb) = output.pdb {
        fs::write(path.with_extension("pdb"), pdb).unwrap();
    }
    path
}

/// The `.cctor` methods of `<Module>`.
pub fn module_initializers(image: &Image) -> Vec<&MethodRecord> {
    let module = image.module_type().unwrap();
    image
        .methods_of(module)
        .filter(|method| method.name == ".cctor")
        .collect()
}

/// Token of `type_name::method_name`.
pub fn method_token(image: &Image, type_name: &str, method_name: &str) -> Token {
    let (_, ty) = image.find_type(type_name).unwrap();
    let (id, _) = image.find_method(ty, method_name).unwrap();
    image.method_token(id).unwrap()
}

/// Name of the method a `call` operand refers to.
pub fn callee_name<'a>(image: &'a Image, operand: &Operand) -> &'a str {
    let Operand::Token(token) = operand else {
        panic!("operand {operand:?} is not a token");
    };
    image
        .methods()
        .iter()
        .find(|method| method.token() == Some(*token))
        .map(|method| method.name.as_str())
        .unwrap()
}
