//! Loading images into the [`Image`] model.
//!
//! The reader parses the PE container, the CLI header and the metadata, then builds a
//! [`TypeRecord`] per `TypeDef` row and a [`MethodRecord`] per `MethodDef` row, decoding
//! each method's signature and IL body on the way. Any parse failure is reported as
//! [`Error::MalformedImage`]; problems with the companion PDB as
//! [`Error::MalformedSymbols`].

use std::path::Path;

use log::{debug, info};

use crate::{
    disassembler::{decode_stream, Instruction},
    file::{parser::Parser, File},
    image::{Image, MethodId, MethodRecord, Param, TypeRecord},
    metadata::{
        cor20header::{Cor20Header, COR20_HEADER_SIZE},
        method::{MethodBody, MethodImplCodeType},
        signatures::parse_method_signature,
        tables::{columns, CodedIndexType, TableId},
        token::Token,
        Metadata,
    },
    symbols, Error, Result,
};

/// Nesting depth after which type names are no longer expanded
const MAX_NESTING: usize = 64;

/// Read the image at `path`, together with its companion PDB if one exists.
///
/// # Errors
/// - [`Error::NotFound`] if `path` does not exist
/// - [`Error::MalformedImage`] if the file is not a readable CLI image
/// - [`Error::MalformedSymbols`] if `<path stem>.pdb` exists but cannot be used
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
///
/// let image = modinit::read(Path::new("Library.dll"))?;
/// for ty in image.types() {
///     println!("{} ({} methods)", ty.full_name(), ty.methods.len());
/// }
/// # Ok::<(), modinit::Error>(())
/// ```
pub fn read(path: &Path) -> Result<Image> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let file = File::from_file(path).map_err(Error::into_image_error)?;
    let mut image = load(Some(path), file)?;
    info!(
        "Read {} ({} types, {} methods)",
        path.display(),
        image.types().len(),
        image.methods().len()
    );

    if let Some(symbols) = symbols::load(
        &symbols::symbols_path(path),
        image.file(),
        image.metadata(),
    )? {
        image.attach_symbols(symbols);
    }

    Ok(image)
}

/// Read an image from memory. No companion symbols are looked for.
///
/// # Errors
/// [`Error::MalformedImage`] if the data is not a readable CLI image.
pub fn read_from_mem(data: Vec<u8>) -> Result<Image> {
    let file = File::from_mem(data).map_err(Error::into_image_error)?;
    load(None, file)
}

fn load(path: Option<&Path>, file: File) -> Result<Image> {
    let (cor20, metadata, types, methods) = parse(&file).map_err(Error::into_image_error)?;
    Ok(Image::new(
        path.map(Path::to_path_buf),
        file,
        cor20,
        metadata,
        types,
        methods,
    ))
}

type Parsed = (Cor20Header, Metadata, Vec<TypeRecord>, Vec<MethodRecord>);

fn parse(file: &File) -> Result<Parsed> {
    let (clr_rva, _) = file.clr();
    let cor20 = Cor20Header::read(file.rva_slice(clr_rva, COR20_HEADER_SIZE)?)?;
    let metadata = Metadata::read(
        file.rva_slice(cor20.meta_data_rva, cor20.meta_data_size as usize)?,
    )?;

    if metadata.is_pdb() {
        return Err(malformed_error!("The image metadata is a portable PDB"));
    }

    let methods = read_methods(file, &metadata)?;
    let types = read_types(&metadata)?;

    debug!(
        "Metadata version {} with {} TypeDef and {} MethodDef rows",
        metadata.root.version(),
        types.len(),
        methods.len()
    );

    Ok((cor20, metadata, types, methods))
}

/// The row range `[start, end)` a list column describes for row `rid`.
///
/// The run ends where the next row's run starts, or after the last row of the target.
fn list_range(
    metadata: &Metadata,
    owner: TableId,
    column: usize,
    rid: u32,
    target: TableId,
) -> Result<(u32, u32)> {
    let table = metadata.tables.table(owner);
    let target_rows = metadata.tables.rows(target);

    let start = table.cell(rid, column)?;
    let end = if rid < table.len() as u32 {
        table.cell(rid + 1, column)?
    } else {
        target_rows + 1
    };

    if start == 0 || start > end || end > target_rows + 1 {
        return Err(malformed_error!(
            "{:?} row {} owns an invalid {:?} range {}..{}",
            owner,
            rid,
            target,
            start,
            end
        ));
    }

    Ok((start, end))
}

fn read_types(metadata: &Metadata) -> Result<Vec<TypeRecord>> {
    let table = metadata.tables.table(TableId::TypeDef);

    let mut types = Vec::with_capacity(table.len());
    for rid in 1..=table.len() as u32 {
        let (start, end) = list_range(
            metadata,
            TableId::TypeDef,
            columns::TYPEDEF_METHOD_LIST,
            rid,
            TableId::MethodDef,
        )?;

        types.push(TypeRecord {
            rid: Some(rid),
            name: metadata
                .strings
                .get(table.cell(rid, columns::TYPEDEF_NAME)? as usize)?
                .to_string(),
            namespace: metadata
                .strings
                .get(table.cell(rid, columns::TYPEDEF_NAMESPACE)? as usize)?
                .to_string(),
            flags: table.cell(rid, columns::TYPEDEF_FLAGS)?,
            methods: (start..end).map(|rid| MethodId(rid as usize - 1)).collect(),
        });
    }

    Ok(types)
}

fn read_methods(file: &File, metadata: &Metadata) -> Result<Vec<MethodRecord>> {
    let names = TypeNames { metadata };
    let table = metadata.tables.table(TableId::MethodDef);
    let params = metadata.tables.table(TableId::Param);

    let mut methods = Vec::with_capacity(table.len());
    for rid in 1..=table.len() as u32 {
        let name = metadata
            .strings
            .get(table.cell(rid, columns::METHOD_NAME)? as usize)?
            .to_string();
        let rva = table.cell(rid, columns::METHOD_RVA)?;
        let impl_flags = table.cell(rid, columns::METHOD_IMPL_FLAGS)?;

        let signature = parse_method_signature(
            metadata
                .blobs
                .get(table.cell(rid, columns::METHOD_SIGNATURE)? as usize)?,
        )
        .map_err(|error| malformed_error!("Signature of method {} - {}", name, error))?;

        let (start, end) = list_range(
            metadata,
            TableId::MethodDef,
            columns::METHOD_PARAM_LIST,
            rid,
            TableId::Param,
        )?;
        let mut param_names = Vec::with_capacity((end - start) as usize);
        for param in start..end {
            let sequence = params.cell(param, columns::PARAM_SEQUENCE)?;
            let param_name = metadata
                .strings
                .get(params.cell(param, columns::PARAM_NAME)? as usize)?;
            param_names.push((sequence, param_name));
        }

        let method_params = signature
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let sequence = index as u16 + 1;
                Param {
                    name: param_names
                        .iter()
                        .find(|(candidate, _)| *candidate == u32::from(sequence))
                        .map(|(_, name)| (*name).to_string()),
                    sequence,
                    type_name: param.full_name(&|token| names.name(token)),
                }
            })
            .collect();

        let (body, instructions) = read_body(file, rva, impl_flags)
            .map_err(|error| malformed_error!("Body of method {} - {}", name, error))?;

        methods.push(MethodRecord {
            rid: Some(rid),
            return_type: signature
                .return_type
                .full_name(&|token| names.name(token)),
            name,
            rva,
            flags: table.cell(rid, columns::METHOD_FLAGS)?,
            impl_flags,
            signature,
            params: method_params,
            body,
            instructions,
            encoded_body: None,
            encoded_signature: None,
        });
    }

    Ok(methods)
}

fn read_body(
    file: &File,
    rva: u32,
    impl_flags: u32,
) -> Result<(Option<MethodBody>, Vec<Instruction>)> {
    if rva == 0 || MethodImplCodeType::from_impl_flags(impl_flags) != MethodImplCodeType::IL {
        return Ok((None, Vec::new()));
    }

    let data = file.rva_tail(rva)?;
    let body = MethodBody::from(data)?;
    let code = body.code(data)?;

    let mut parser = Parser::new(code);
    let instructions = decode_stream(&mut parser, u64::from(rva) + body.size_header as u64)?;

    Ok((Some(body), instructions))
}

/// Renders `TypeDef`, `TypeRef` and `TypeSpec` tokens as namespace qualified names.
///
/// Nested types are joined to their enclosing type with `+`. Lookup failures fall back to
/// the token itself, a name is only used for display and validation.
struct TypeNames<'a> {
    metadata: &'a Metadata,
}

impl TypeNames<'_> {
    fn name(&self, token: Token) -> String {
        self.lookup(token, 0)
            .unwrap_or_else(|_| format!("{token}"))
    }

    fn lookup(&self, token: Token, depth: usize) -> Result<String> {
        if depth > MAX_NESTING {
            return Err(malformed_error!("Type nesting too deep at {}", token));
        }

        let strings = &self.metadata.strings;
        let tables = &self.metadata.tables;
        match TableId::from_u8(token.table()) {
            Some(TableId::TypeDef) => {
                let table = tables.table(TableId::TypeDef);
                let name = strings.get(table.cell(token.row(), columns::TYPEDEF_NAME)? as usize)?;
                let namespace =
                    strings.get(table.cell(token.row(), columns::TYPEDEF_NAMESPACE)? as usize)?;

                let enclosing = tables
                    .table(TableId::NestedClass)
                    .iter()
                    .find(|row| row[columns::NESTED_CLASS] == token.row())
                    .map(|row| row[columns::NESTED_ENCLOSING]);

                match enclosing {
                    Some(outer) => Ok(format!(
                        "{}+{}",
                        self.lookup(Token::from_parts(TableId::TypeDef, outer), depth + 1)?,
                        name
                    )),
                    None => Ok(qualified(namespace, name)),
                }
            }
            Some(TableId::TypeRef) => {
                let table = tables.table(TableId::TypeRef);
                let name = strings.get(table.cell(token.row(), columns::TYPEREF_NAME)? as usize)?;
                let namespace =
                    strings.get(table.cell(token.row(), columns::TYPEREF_NAMESPACE)? as usize)?;
                let scope = table.cell(token.row(), columns::TYPEREF_SCOPE)?;

                match CodedIndexType::ResolutionScope.decode(scope)? {
                    (TableId::TypeRef, outer) if outer != 0 => Ok(format!(
                        "{}+{}",
                        self.lookup(Token::from_parts(TableId::TypeRef, outer), depth + 1)?,
                        name
                    )),
                    _ => Ok(qualified(namespace, name)),
                }
            }
            _ => Err(malformed_error!("{} is not a named type", token)),
        }
    }
}

fn qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disassembler::Operand,
        test::fixture::{FixtureMethod, FixtureType, ImageFixture, ELEMENT_STRING},
    };

    #[test]
    fn types_and_methods() {
        let image = read_from_mem(ImageFixture::new().build()).unwrap();

        let names: Vec<String> = image.types().iter().map(TypeRecord::full_name).collect();
        assert_eq!(names, ["<Module>", "Fixture.Init", "Fixture.Helpers"]);

        let (_, init) = image.find_type("Init").unwrap();
        assert_eq!(init.methods.len(), 9);

        let (_, go) = image.find_method(init, "Go").unwrap();
        assert!(go.is_static());
        assert!(go.params.is_empty());
        assert_eq!(go.return_type, "System.Void");
        assert_eq!(go.instructions.len(), 1);
        assert_eq!(go.instructions[0].mnemonic, "ret");

        let (_, with_arg) = image.find_method(init, "WithArg").unwrap();
        assert_eq!(
            with_arg.params,
            vec![Param {
                name: Some("arg0".to_string()),
                sequence: 1,
                type_name: "System.Int32".to_string(),
            }]
        );

        let (_, answer) = image.find_method(init, "Answer").unwrap();
        assert_eq!(answer.return_type, "System.Int32");
        assert!(!image.find_method(init, "Instance").unwrap().1.is_static());
    }

    #[test]
    fn bodies() {
        let image = read_from_mem(ImageFixture::new().build()).unwrap();
        let (_, helpers) = image.find_type("Helpers").unwrap();
        let (_, run) = image.find_method(helpers, "Run").unwrap();

        assert_eq!(run.instructions.len(), 2);
        assert_eq!(run.instructions[0].mnemonic, "call");
        assert_eq!(
            run.instructions[0].operand,
            Operand::Token(Token::new(0x0600_0001))
        );
        assert_eq!(u64::from(run.rva) + 1, run.instructions[0].rva);

        let (_, init) = image.find_type("Init").unwrap();
        let (_, guarded) = image.find_method(init, "Guarded").unwrap();
        let body = guarded.body.as_ref().unwrap();
        assert!(body.is_fat);
        assert_eq!(body.exception_handlers.len(), 1);
        assert_eq!(guarded.instructions.len(), 4);
    }

    #[test]
    fn module_methods_and_abstract() {
        let fixture = ImageFixture::bare()
            .with_module_method(FixtureMethod::public_static("Setup"))
            .with_type(
                FixtureType::new("", "Shape")
                    .method(FixtureMethod::new("Area", 0x0446).without_body())
                    .method(FixtureMethod::public_static("Describe").returning(ELEMENT_STRING)),
            );
        let image = read_from_mem(fixture.build()).unwrap();

        let module = image.module_type().unwrap();
        assert_eq!(module.methods.len(), 1);
        assert_eq!(image.methods_of(module).next().unwrap().name, "Setup");

        let (_, shape) = image.find_type("Shape").unwrap();
        assert_eq!(shape.full_name(), "Shape");
        let (_, area) = image.find_method(shape, "Area").unwrap();
        assert!(area.body.is_none());
        assert!(area.instructions.is_empty());
        assert_eq!(
            image.find_method(shape, "Describe").unwrap().1.return_type,
            "System.String"
        );
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            read_from_mem(vec![0x4D, 0x5A, 0x00]),
            Err(Error::MalformedImage(_))
        ));
        assert!(matches!(
            read_from_mem(Vec::new()),
            Err(Error::MalformedImage(_))
        ));

        // Break the tiny header of the first body
        let mut data = ImageFixture::new().build();
        let offset = 0x200 + 80;
        data[offset] = 0x01;
        assert!(matches!(read_from_mem(data), Err(Error::MalformedImage(_))));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read(Path::new("/nonexistent/Library.dll")),
            Err(Error::NotFound(_))
        ));
    }
}
