mod common;

use common::{
    callee_name,
    fixture::{FixtureMethod, ImageFixture, METHOD_PUBLIC, METHOD_STATIC},
    method_token, module_initializers, write_fixture,
};
use modinit::{inject, read, resolve, write, Error};

#[test]
fn end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "Library", &ImageFixture::new());

    let mut image = read(&path).unwrap();
    let module_methods = image.module_type().unwrap().methods.len();
    let target = resolve(&image, "Init", "Go").unwrap();
    inject(&mut image, &target).unwrap();
    write(&image, &path, None).unwrap();
    drop(image);

    let image = read(&path).unwrap();
    assert_eq!(
        image.module_type().unwrap().methods.len(),
        module_methods + 1
    );

    let initializers = module_initializers(&image);
    assert_eq!(initializers.len(), 1);
    let cctor = initializers[0];
    assert!(cctor.is_static());
    assert_eq!(cctor.instructions.len(), 2);
    assert_eq!(cctor.instructions[0].mnemonic, "call");
    assert_eq!(callee_name(&image, &cctor.instructions[0].operand), "Go");
    assert_eq!(cctor.instructions[1].mnemonic, "ret");
}

#[test]
fn existing_code_still_calls_go() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "Library", &ImageFixture::new());

    let mut image = read(&path).unwrap();
    let target = resolve(&image, "Helpers", "Run").unwrap();
    inject(&mut image, &target).unwrap();
    write(&image, &path, None).unwrap();
    drop(image);

    let image = read(&path).unwrap();
    for (type_name, method_name) in [("Init", "Caller"), ("Helpers", "Run")] {
        let (_, ty) = image.find_type(type_name).unwrap();
        let (_, method) = image.find_method(ty, method_name).unwrap();
        let call = method
            .instructions
            .iter()
            .find(|instruction| instruction.mnemonic == "call")
            .unwrap();
        assert_eq!(callee_name(&image, &call.operand), "Go", "{method_name}");
    }

    let cctor = module_initializers(&image)[0];
    assert_eq!(callee_name(&image, &cctor.instructions[0].operand), "Run");
}

#[test]
fn module_with_methods() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ImageFixture::new()
        .with_module_method(FixtureMethod::new("Helper", METHOD_PUBLIC | METHOD_STATIC));
    let path = write_fixture(dir.path(), "Library", &fixture);

    let mut image = read(&path).unwrap();
    let target = resolve(&image, "Init", "Go").unwrap();
    inject(&mut image, &target).unwrap();
    write(&image, &path, None).unwrap();
    drop(image);

    let image = read(&path).unwrap();
    let names: Vec<&str> = image
        .methods_of(image.module_type().unwrap())
        .map(|method| method.name.as_str())
        .collect();
    assert_eq!(names, ["Helper", ".cctor"]);

    // The new row sits right behind Helper, Go moves up by one
    let cctor = module_initializers(&image)[0];
    assert_eq!(cctor.token().unwrap().row(), 2);
    assert_eq!(method_token(&image, "Init", "Go").row(), 3);
    assert_eq!(callee_name(&image, &cctor.instructions[0].operand), "Go");
}

#[test]
fn validation_failures() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "Library", &ImageFixture::new());
    let image = read(&path).unwrap();
    let methods = image.methods().len();

    assert!(matches!(
        resolve(&image, "Nope", "Go"),
        Err(Error::TypeNotFound(name)) if name == "Nope"
    ));
    assert!(matches!(
        resolve(&image, "Init", "Missing"),
        Err(Error::MethodNotFound { method, .. }) if method == "Missing"
    ));
    assert!(matches!(
        resolve(&image, "Init", "WithArg"),
        Err(Error::InvalidSignature(_))
    ));
    assert!(matches!(
        resolve(&image, "Init", "Hidden"),
        Err(Error::InvalidVisibility(_))
    ));
    assert!(matches!(
        resolve(&image, "Init", "Prot"),
        Err(Error::InvalidVisibility(_))
    ));
    assert!(matches!(
        resolve(&image, "Init", "Answer"),
        Err(Error::InvalidReturnType { .. })
    ));
    assert!(matches!(
        resolve(&image, "Init", "Instance"),
        Err(Error::NotStatic(_))
    ));

    // internal is visible enough
    assert!(resolve(&image, "Init", "Internal").is_ok());
    assert_eq!(image.methods().len(), methods);
}

#[test]
fn no_module_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "Library",
        &ImageFixture::new().without_module_type(),
    );

    let mut image = read(&path).unwrap();
    let target = resolve(&image, "Init", "Go").unwrap();
    assert!(matches!(
        inject(&mut image, &target),
        Err(Error::NoModuleType)
    ));
}

#[test]
fn target_from_another_image() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_fixture(dir.path(), "First", &ImageFixture::new());
    let second = write_fixture(dir.path(), "Second", &ImageFixture::new());

    let source = read(&first).unwrap();
    let target = resolve(&source, "Init", "Go").unwrap();

    let mut image = read(&second).unwrap();
    assert!(!target.belongs_to(&image));
    inject(&mut image, &target).unwrap();
    write(&image, &second, None).unwrap();
    drop(image);

    let image = read(&second).unwrap();
    let cctor = module_initializers(&image)[0];
    assert_eq!(callee_name(&image, &cctor.instructions[0].operand), "Go");
}
