//! Synthetic CLI images and portable PDBs for tests.
//!
//! The builder emits a minimal but well-formed PE32 DLL: one `.text` section holding the CLI
//! header, tiny/fat method bodies, the metadata root with `#~`, `#Strings`, `#US`, `#GUID` and
//! `#Blob`, and (optionally) a debug directory with a CodeView and a PdbChecksum entry. A
//! matching portable PDB can be produced alongside. Only the standard library is used so that
//! the file can be shared verbatim with the integration tests.
#![allow(dead_code)]

pub const ELEMENT_VOID: u8 = 0x01;
pub const ELEMENT_BOOLEAN: u8 = 0x02;
pub const ELEMENT_I4: u8 = 0x08;
pub const ELEMENT_STRING: u8 = 0x0E;

pub const METHOD_PRIVATE: u16 = 0x0001;
pub const METHOD_FAM_AND_ASSEM: u16 = 0x0002;
pub const METHOD_ASSEMBLY: u16 = 0x0003;
pub const METHOD_FAMILY: u16 = 0x0004;
pub const METHOD_FAM_OR_ASSEM: u16 = 0x0005;
pub const METHOD_PUBLIC: u16 = 0x0006;
pub const METHOD_STATIC: u16 = 0x0010;
pub const METHOD_VIRTUAL: u16 = 0x0040;
pub const METHOD_HIDE_BY_SIG: u16 = 0x0080;
pub const METHOD_ABSTRACT: u16 = 0x0400;

/// RVA of the `.text` section of every fixture image
pub const TEXT_RVA: u32 = 0x2000;
/// File offset of the `.text` section of every fixture image
pub const TEXT_OFFSET: u32 = 0x200;
/// RVA of the CLI header
pub const CLI_HEADER_RVA: u32 = TEXT_RVA + 8;

const SECTION_ALIGNMENT: u32 = 0x2000;
const FILE_ALIGNMENT: u32 = 0x200;
const PE_OFFSET: usize = 0x80;
const SORTED_TABLES: u64 = 0x0000_1600_3301_FA00;

const TABLE_MODULE: usize = 0x00;
const TABLE_TYPEREF: usize = 0x01;
const TABLE_TYPEDEF: usize = 0x02;
const TABLE_METHODDEF: usize = 0x06;
const TABLE_PARAM: usize = 0x08;
const TABLE_MEMBERREF: usize = 0x0A;
const TABLE_CUSTOMATTRIBUTE: usize = 0x0C;
const TABLE_ASSEMBLY: usize = 0x20;
const TABLE_ASSEMBLYREF: usize = 0x23;
const TABLE_GENERICPARAM: usize = 0x2A;

/// `AsyncMethodSteppingInformation` kind {54FD2AC5-E925-401A-9C2A-F94F171072F8}
pub const ASYNC_STEPPING_KIND: [u8; 16] = [
    0xC5, 0x2A, 0xFD, 0x54, 0x25, 0xE9, 0x1A, 0x40, 0x9C, 0x2A, 0xF9, 0x4F, 0x17, 0x10, 0x72, 0xF8,
];

/// Body shapes the fixture can emit.
#[derive(Clone, Debug)]
pub enum FixtureBody {
    /// `ret` (preceded by `ldc.i4.0` for non-void methods)
    Ret,
    /// `call <method>; ret`, the target looked up by name
    Call(String),
    /// Fat header with a try/finally clause
    Fat,
    /// No body, RVA 0
    Abstract,
}

#[derive(Clone, Debug)]
pub struct FixtureMethod {
    pub name: String,
    pub flags: u16,
    pub params: Vec<u8>,
    pub ret: u8,
    pub body: FixtureBody,
    pub generic_params: Vec<String>,
}

impl FixtureMethod {
    pub fn new(name: &str, flags: u16) -> Self {
        FixtureMethod {
            name: name.to_string(),
            flags,
            params: Vec::new(),
            ret: ELEMENT_VOID,
            body: FixtureBody::Ret,
            generic_params: Vec::new(),
        }
    }

    pub fn public_static(name: &str) -> Self {
        Self::new(name, METHOD_PUBLIC | METHOD_STATIC | METHOD_HIDE_BY_SIG)
    }

    pub fn with_params(mut self, params: &[u8]) -> Self {
        self.params = params.to_vec();
        self
    }

    pub fn returning(mut self, ret: u8) -> Self {
        self.ret = ret;
        self
    }

    pub fn calling(mut self, target: &str) -> Self {
        self.body = FixtureBody::Call(target.to_string());
        self
    }

    pub fn fat(mut self) -> Self {
        self.body = FixtureBody::Fat;
        self
    }

    pub fn without_body(mut self) -> Self {
        self.body = FixtureBody::Abstract;
        self
    }

    pub fn generic(mut self, name: &str) -> Self {
        self.generic_params.push(name.to_string());
        self
    }

    fn is_static(&self) -> bool {
        self.flags & METHOD_STATIC != 0
    }

    fn signature(&self) -> Vec<u8> {
        let mut calling_convention = if self.is_static() { 0x00 } else { 0x20 };
        if !self.generic_params.is_empty() {
            calling_convention |= 0x10;
        }

        let mut blob = vec![calling_convention];
        if !self.generic_params.is_empty() {
            blob.push(self.generic_params.len() as u8);
        }
        blob.push(self.params.len() as u8);
        blob.push(self.ret);
        blob.extend_from_slice(&self.params);
        blob
    }
}

#[derive(Clone, Debug)]
pub struct FixtureType {
    pub namespace: String,
    pub name: String,
    pub methods: Vec<FixtureMethod>,
    pub generic_params: Vec<String>,
}

impl FixtureType {
    pub fn new(namespace: &str, name: &str) -> Self {
        FixtureType {
            namespace: namespace.to_string(),
            name: name.to_string(),
            methods: Vec::new(),
            generic_params: Vec::new(),
        }
    }

    pub fn method(mut self, method: FixtureMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub fn generic(mut self, name: &str) -> Self {
        self.generic_params.push(name.to_string());
        self
    }
}

/// The bytes produced by [`ImageFixture::build_all`].
pub struct FixtureOutput {
    pub image: Vec<u8>,
    pub pdb: Option<Vec<u8>>,
}

/// Builder for synthetic CLI images.
#[derive(Clone, Debug)]
pub struct ImageFixture {
    module_methods: Vec<FixtureMethod>,
    types: Vec<FixtureType>,
    module_type: bool,
    entry_point: Option<String>,
    custom_attributes: bool,
    public_key: Option<Vec<u8>>,
    sn_signature_size: u32,
    pdb_guid: Option<[u8; 16]>,
    pdb_checksum: bool,
    padding_sections: usize,
    overlay: Vec<u8>,
    file_name: String,
}

impl Default for ImageFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFixture {
    /// The standard fixture: `Fixture.Init` with one method per validation rule, and
    /// `Fixture.Helpers` calling into it.
    pub fn new() -> Self {
        let init = FixtureType::new("Fixture", "Init")
            .method(FixtureMethod::public_static("Go"))
            .method(FixtureMethod::public_static("Caller").calling("Go"))
            .method(FixtureMethod::public_static("Guarded").fat())
            .method(FixtureMethod::public_static("WithArg").with_params(&[ELEMENT_I4]))
            .method(FixtureMethod::new(
                "Hidden",
                METHOD_PRIVATE | METHOD_STATIC | METHOD_HIDE_BY_SIG,
            ))
            .method(FixtureMethod::new(
                "Prot",
                METHOD_FAMILY | METHOD_STATIC | METHOD_HIDE_BY_SIG,
            ))
            .method(FixtureMethod::public_static("Answer").returning(ELEMENT_I4))
            .method(FixtureMethod::new(
                "Instance",
                METHOD_PUBLIC | METHOD_HIDE_BY_SIG,
            ))
            .method(FixtureMethod::new(
                "Internal",
                METHOD_ASSEMBLY | METHOD_STATIC | METHOD_HIDE_BY_SIG,
            ));
        let helpers = FixtureType::new("Fixture", "Helpers")
            .method(FixtureMethod::public_static("Run").calling("Go"));

        ImageFixture {
            module_methods: Vec::new(),
            types: vec![init, helpers],
            module_type: true,
            entry_point: None,
            custom_attributes: false,
            public_key: None,
            sn_signature_size: 0,
            pdb_guid: None,
            pdb_checksum: false,
            padding_sections: 0,
            overlay: Vec::new(),
            file_name: "fixture.dll".to_string(),
        }
    }

    /// A fixture without any user types.
    pub fn bare() -> Self {
        ImageFixture {
            types: Vec::new(),
            ..Self::new()
        }
    }

    pub fn with_type(mut self, ty: FixtureType) -> Self {
        self.types.push(ty);
        self
    }

    pub fn with_module_method(mut self, method: FixtureMethod) -> Self {
        self.module_methods.push(method);
        self
    }

    /// Names the first TypeDef something other than `<Module>`.
    pub fn without_module_type(mut self) -> Self {
        self.module_type = false;
        self
    }

    pub fn with_entry_point(mut self, method: &str) -> Self {
        self.entry_point = Some(method.to_string());
        self
    }

    /// Attaches a custom attribute to every user type, method and generic parameter.
    pub fn with_custom_attributes(mut self) -> Self {
        self.custom_attributes = true;
        self
    }

    pub fn with_public_key(mut self, key: &[u8]) -> Self {
        self.public_key = Some(key.to_vec());
        self
    }

    /// Reserves a strong name signature blob and sets the signed flag.
    pub fn with_strong_name_signature(mut self, size: u32) -> Self {
        self.sn_signature_size = size;
        self
    }

    /// Adds a CodeView debug entry naming a portable PDB with this id.
    pub fn with_pdb(mut self, guid: [u8; 16]) -> Self {
        self.pdb_guid = Some(guid);
        self
    }

    /// Adds a PdbChecksum debug entry (requires [`ImageFixture::with_pdb`]).
    pub fn with_pdb_checksum(mut self) -> Self {
        self.pdb_checksum = true;
        self
    }

    /// Adds sections after `.text` until the section table has no room left.
    pub fn with_padding_sections(mut self, count: usize) -> Self {
        self.padding_sections = count;
        self
    }

    /// Appends bytes after the last section.
    pub fn with_overlay(mut self, overlay: &[u8]) -> Self {
        self.overlay = overlay.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_all().image
    }

    /// All methods in MethodDef row order.
    pub fn methods(&self) -> Vec<&FixtureMethod> {
        self.module_methods
            .iter()
            .chain(self.types.iter().flat_map(|ty| ty.methods.iter()))
            .collect()
    }

    /// MethodDef row id of the first method named `name`.
    pub fn method_rid(&self, name: &str) -> Option<u32> {
        self.methods()
            .iter()
            .position(|method| method.name == name)
            .map(|index| index as u32 + 1)
    }

    pub fn build_all(&self) -> FixtureOutput {
        let methods = self.methods();

        let mut strings = StringHeap::new();
        let mut blobs = BlobHeap::new();
        let mut guids: Vec<u8> = Vec::new();
        guids.extend_from_slice(&[0x11; 16]);

        // .text layout: 8 zero bytes, CLI header, method bodies, signature, metadata, debug
        let mut text = vec![0u8; 8 + 72];
        let mut method_rvas = Vec::new();
        let mut code_sizes = Vec::new();
        for method in &methods {
            if matches!(method.body, FixtureBody::Abstract) {
                method_rvas.push(0);
                code_sizes.push(0);
                continue;
            }

            align(&mut text, 4);
            method_rvas.push(TEXT_RVA + text.len() as u32);
            let body = self.body_bytes(method);
            code_sizes.push(body.1);
            text.extend_from_slice(&body.0);
        }

        align(&mut text, 4);
        let sn_rva = TEXT_RVA + text.len() as u32;
        text.resize(text.len() + self.sn_signature_size as usize, 0);

        // Metadata
        align(&mut text, 4);
        let metadata_rva = TEXT_RVA + text.len() as u32;
        let (tables, valid, rows) = self.tables(&mut strings, &mut blobs, &method_rvas);
        let metadata = metadata_root(
            "v4.0.30319",
            &[
                ("#~", tables),
                ("#Strings", strings.data.clone()),
                ("#US", vec![0, 0, 0, 0]),
                ("#GUID", guids),
                ("#Blob", blobs.data.clone()),
            ],
        );
        text.extend_from_slice(&metadata);

        // Debug directory
        let mut debug_directory = None;
        if let Some(guid) = self.pdb_guid {
            align(&mut text, 4);
            let directory_rva = TEXT_RVA + text.len() as u32;
            let entry_count = if self.pdb_checksum { 2 } else { 1 };
            let entries_start = text.len();
            text.resize(text.len() + 28 * entry_count, 0);

            let mut codeview = Vec::new();
            codeview.extend_from_slice(b"RSDS");
            codeview.extend_from_slice(&guid);
            codeview.extend_from_slice(&1u32.to_le_bytes());
            let pdb_name = self.file_name.replace(".dll", ".pdb");
            codeview.extend_from_slice(pdb_name.as_bytes());
            codeview.push(0);

            let codeview_rva = TEXT_RVA + text.len() as u32;
            write_debug_entry(
                &mut text[entries_start..entries_start + 28],
                0x0100,
                0x504D,
                2,
                codeview.len() as u32,
                codeview_rva,
            );
            text.extend_from_slice(&codeview);

            if self.pdb_checksum {
                align(&mut text, 4);
                let mut checksum = b"SHA256\0".to_vec();
                checksum.extend_from_slice(&[0u8; 32]);
                let checksum_rva = TEXT_RVA + text.len() as u32;
                write_debug_entry(
                    &mut text[entries_start + 28..entries_start + 56],
                    1,
                    0,
                    19,
                    checksum.len() as u32,
                    checksum_rva,
                );
                text.extend_from_slice(&checksum);
            }

            debug_directory = Some((directory_rva, (28 * entry_count) as u32));
        }

        // CLI header
        let entry_point_token = self
            .entry_point
            .as_ref()
            .and_then(|name| self.method_rid(name))
            .map_or(0, |rid| 0x0600_0000 | rid);
        let mut flags = 1u32;
        if self.sn_signature_size > 0 {
            flags |= 8;
        }
        {
            let header = &mut text[8..80];
            put_u32(header, 0, 72);
            put_u16(header, 4, 2);
            put_u16(header, 6, 5);
            put_u32(header, 8, metadata_rva);
            put_u32(header, 12, metadata.len() as u32);
            put_u32(header, 16, flags);
            put_u32(header, 20, entry_point_token);
            if self.sn_signature_size > 0 {
                put_u32(header, 32, sn_rva);
                put_u32(header, 36, self.sn_signature_size);
            }
        }

        let text_virtual_size = text.len() as u32;
        align(&mut text, FILE_ALIGNMENT as usize);

        // Patch debug entries with their file offsets now that the layout is fixed
        if let Some((directory_rva, size)) = debug_directory {
            let start = (directory_rva - TEXT_RVA) as usize;
            for entry in 0..(size as usize / 28) {
                let at = start + entry * 28;
                let rva = get_u32(&text, at + 20);
                put_u32(&mut text, at + 24, rva - TEXT_RVA + TEXT_OFFSET);
            }
        }

        let image = self.pe(&text, text_virtual_size, debug_directory);

        let pdb = self.pdb_guid.map(|guid| {
            self.pdb(
                guid,
                entry_point_token,
                valid,
                &rows,
                &methods,
                &code_sizes,
            )
        });

        FixtureOutput { image, pdb }
    }

    fn body_bytes(&self, method: &FixtureMethod) -> (Vec<u8>, u32) {
        match &method.body {
            FixtureBody::Ret => {
                if method.ret == ELEMENT_VOID {
                    (vec![(1 << 2) | 2, 0x2A], 1)
                } else {
                    (vec![(2 << 2) | 2, 0x16, 0x2A], 2)
                }
            }
            FixtureBody::Call(target) => {
                let rid = self
                    .method_rid(target)
                    .unwrap_or_else(|| panic!("unknown call target {target}"));
                let mut body = vec![(6 << 2) | 2, 0x28];
                body.extend_from_slice(&(0x0600_0000 | rid).to_le_bytes());
                body.push(0x2A);
                (body, 6)
            }
            FixtureBody::Fat => {
                let mut body = Vec::new();
                body.extend_from_slice(&0x301Bu16.to_le_bytes());
                body.extend_from_slice(&8u16.to_le_bytes());
                body.extend_from_slice(&5u32.to_le_bytes());
                body.extend_from_slice(&0u32.to_le_bytes());
                // nop; leave.s +0; endfinally; ret
                body.extend_from_slice(&[0x00, 0xDE, 0x00, 0xDC, 0x2A]);
                align(&mut body, 4);
                // Small EH section with one finally clause
                body.extend_from_slice(&[0x01, 16, 0x00, 0x00]);
                body.extend_from_slice(&2u16.to_le_bytes());
                body.extend_from_slice(&0u16.to_le_bytes());
                body.push(3);
                body.extend_from_slice(&3u16.to_le_bytes());
                body.push(1);
                body.extend_from_slice(&0u32.to_le_bytes());
                (body, 5)
            }
            FixtureBody::Abstract => (Vec::new(), 0),
        }
    }

    fn first_typedef_name(&self) -> &str {
        if self.module_type {
            "<Module>"
        } else {
            "NotModule"
        }
    }

    fn tables(
        &self,
        strings: &mut StringHeap,
        blobs: &mut BlobHeap,
        method_rvas: &[u32],
    ) -> (Vec<u8>, u64, [u32; 64]) {
        let methods = self.methods();
        let mut rows = [0u32; 64];
        let mut data: Vec<(usize, Vec<u8>)> = Vec::new();

        // Module
        let mut module = Vec::new();
        push16(&mut module, 0);
        push16(&mut module, strings.add(&self.file_name));
        push16(&mut module, 1);
        push16(&mut module, 0);
        push16(&mut module, 0);
        rows[TABLE_MODULE] = 1;
        data.push((TABLE_MODULE, module));

        // TypeRef: System.Object from AssemblyRef 1
        let mut typeref = Vec::new();
        push16(&mut typeref, (1 << 2) | 2);
        push16(&mut typeref, strings.add("Object"));
        push16(&mut typeref, strings.add("System"));
        rows[TABLE_TYPEREF] = 1;
        data.push((TABLE_TYPEREF, typeref));

        // TypeDef
        let mut typedef = Vec::new();
        let module_name = self.first_typedef_name().to_string();
        push32(&mut typedef, 0);
        push16(&mut typedef, strings.add(&module_name));
        push16(&mut typedef, 0);
        push16(&mut typedef, 0);
        push16(&mut typedef, 1);
        push16(&mut typedef, 1);
        let mut next_method = 1 + self.module_methods.len() as u16;
        for ty in &self.types {
            push32(&mut typedef, 0x0010_0001);
            push16(&mut typedef, strings.add(&ty.name));
            push16(&mut typedef, strings.add(&ty.namespace));
            push16(&mut typedef, (1 << 2) | 1);
            push16(&mut typedef, 1);
            push16(&mut typedef, next_method);
            next_method += ty.methods.len() as u16;
        }
        rows[TABLE_TYPEDEF] = 1 + self.types.len() as u32;
        data.push((TABLE_TYPEDEF, typedef));

        // MethodDef + Param
        let mut methoddef = Vec::new();
        let mut param = Vec::new();
        let mut param_count = 0u16;
        for (method, rva) in methods.iter().zip(method_rvas) {
            push32(&mut methoddef, *rva);
            push16(&mut methoddef, 0);
            push16(&mut methoddef, method.flags);
            push16(&mut methoddef, strings.add(&method.name));
            push16(&mut methoddef, blobs.add(&method.signature()));
            push16(&mut methoddef, param_count + 1);
            for (index, _) in method.params.iter().enumerate() {
                push16(&mut param, 0);
                push16(&mut param, index as u16 + 1);
                push16(&mut param, strings.add(&format!("arg{index}")));
                param_count += 1;
            }
        }
        rows[TABLE_METHODDEF] = methods.len() as u32;
        data.push((TABLE_METHODDEF, methoddef));
        if param_count > 0 {
            rows[TABLE_PARAM] = u32::from(param_count);
            data.push((TABLE_PARAM, param));
        }

        // GenericParam, ordered by owner
        let mut generic_params: Vec<(u16, u16, String)> = Vec::new();
        for (index, ty) in self.types.iter().enumerate() {
            for (number, name) in ty.generic_params.iter().enumerate() {
                let owner = ((index as u16 + 2) << 1) | 0;
                generic_params.push((owner, number as u16, name.clone()));
            }
        }
        for (index, method) in methods.iter().enumerate() {
            for (number, name) in method.generic_params.iter().enumerate() {
                let owner = ((index as u16 + 1) << 1) | 1;
                generic_params.push((owner, number as u16, name.clone()));
            }
        }
        generic_params.sort_by_key(|(owner, number, _)| (*owner, *number));

        if self.custom_attributes {
            let mut memberref = Vec::new();
            push16(&mut memberref, (1 << 3) | 1);
            push16(&mut memberref, strings.add(".ctor"));
            push16(&mut memberref, blobs.add(&[0x20, 0x00, 0x01]));
            rows[TABLE_MEMBERREF] = 1;
            data.push((TABLE_MEMBERREF, memberref));

            let mut parents: Vec<u16> = Vec::new();
            for index in 0..methods.len() {
                parents.push(((index as u16 + 1) << 5) | 0);
            }
            for index in 0..self.types.len() {
                parents.push(((index as u16 + 2) << 5) | 3);
            }
            for index in 0..generic_params.len() {
                parents.push(((index as u16 + 1) << 5) | 19);
            }
            parents.sort_unstable();

            let value = blobs.add(&[0x01, 0x00, 0x00, 0x00]);
            let mut custom_attribute = Vec::new();
            for parent in &parents {
                push16(&mut custom_attribute, *parent);
                push16(&mut custom_attribute, (1 << 3) | 3);
                push16(&mut custom_attribute, value);
            }
            rows[TABLE_CUSTOMATTRIBUTE] = parents.len() as u32;
            data.push((TABLE_CUSTOMATTRIBUTE, custom_attribute));
        }

        // Assembly
        let mut assembly = Vec::new();
        push32(&mut assembly, 0x8004);
        for part in [1u16, 0, 0, 0] {
            push16(&mut assembly, part);
        }
        let (flags, key) = match &self.public_key {
            Some(key) => (1u32, blobs.add(key)),
            None => (0u32, 0),
        };
        push32(&mut assembly, flags);
        push16(&mut assembly, key);
        push16(&mut assembly, strings.add("fixture"));
        push16(&mut assembly, 0);
        rows[TABLE_ASSEMBLY] = 1;
        data.push((TABLE_ASSEMBLY, assembly));

        // AssemblyRef
        let mut assemblyref = Vec::new();
        for part in [4u16, 0, 0, 0] {
            push16(&mut assemblyref, part);
        }
        push32(&mut assemblyref, 0);
        push16(
            &mut assemblyref,
            blobs.add(&[0xB7, 0x7A, 0x5C, 0x56, 0x19, 0x34, 0xE0, 0x89]),
        );
        push16(&mut assemblyref, strings.add("mscorlib"));
        push16(&mut assemblyref, 0);
        push16(&mut assemblyref, 0);
        rows[TABLE_ASSEMBLYREF] = 1;
        data.push((TABLE_ASSEMBLYREF, assemblyref));

        if !generic_params.is_empty() {
            let mut generic_param = Vec::new();
            for (owner, number, name) in &generic_params {
                push16(&mut generic_param, *number);
                push16(&mut generic_param, 0);
                push16(&mut generic_param, *owner);
                push16(&mut generic_param, strings.add(name));
            }
            rows[TABLE_GENERICPARAM] = generic_params.len() as u32;
            data.push((TABLE_GENERICPARAM, generic_param));
        }

        data.sort_by_key(|(id, _)| *id);
        let valid = data.iter().fold(0u64, |mask, (id, _)| mask | (1 << id));
        (tables_stream(valid, SORTED_TABLES, &rows, &data), valid, rows)
    }

    fn pe(&self, text: &[u8], text_virtual_size: u32, debug: Option<(u32, u32)>) -> Vec<u8> {
        let section_count = 1 + self.padding_sections;
        let mut image = vec![0u8; FILE_ALIGNMENT as usize];

        // DOS header
        image[0] = b'M';
        image[1] = b'Z';
        put_u32(&mut image, 0x3C, PE_OFFSET as u32);

        // PE signature + COFF header
        image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");
        let coff = PE_OFFSET + 4;
        put_u16(&mut image, coff, 0x014C);
        put_u16(&mut image, coff + 2, section_count as u16);
        put_u16(&mut image, coff + 16, 0xE0);
        put_u16(&mut image, coff + 18, 0x2102);

        // Optional header (PE32)
        let opt = PE_OFFSET + 24;
        let text_raw = text.len() as u32;
        let pad_raw = FILE_ALIGNMENT * self.padding_sections as u32;
        let last_va = TEXT_RVA + SECTION_ALIGNMENT * self.padding_sections as u32;
        let last_vsize = if self.padding_sections > 0 {
            FILE_ALIGNMENT
        } else {
            text_virtual_size
        };
        put_u16(&mut image, opt, 0x010B);
        image[opt + 2] = 8;
        put_u32(&mut image, opt + 4, text_raw);
        put_u32(&mut image, opt + 8, pad_raw);
        put_u32(&mut image, opt + 20, TEXT_RVA);
        put_u32(&mut image, opt + 28, 0x1000_0000);
        put_u32(&mut image, opt + 32, SECTION_ALIGNMENT);
        put_u32(&mut image, opt + 36, FILE_ALIGNMENT);
        put_u16(&mut image, opt + 40, 4);
        put_u16(&mut image, opt + 48, 4);
        put_u32(
            &mut image,
            opt + 56,
            round_up(last_va + last_vsize, SECTION_ALIGNMENT),
        );
        put_u32(&mut image, opt + 60, FILE_ALIGNMENT);
        put_u16(&mut image, opt + 68, 3);
        put_u16(&mut image, opt + 70, 0x8540);
        put_u32(&mut image, opt + 72, 0x10_0000);
        put_u32(&mut image, opt + 76, 0x1000);
        put_u32(&mut image, opt + 80, 0x10_0000);
        put_u32(&mut image, opt + 84, 0x1000);
        put_u32(&mut image, opt + 92, 16);
        let directories = opt + 96;
        if let Some((rva, size)) = debug {
            put_u32(&mut image, directories + 6 * 8, rva);
            put_u32(&mut image, directories + 6 * 8 + 4, size);
        }
        put_u32(&mut image, directories + 14 * 8, CLI_HEADER_RVA);
        put_u32(&mut image, directories + 14 * 8 + 4, 72);

        // Section table
        let table = opt + 0xE0;
        write_section_header(
            &mut image[table..table + 40],
            ".text",
            text_virtual_size,
            TEXT_RVA,
            text_raw,
            TEXT_OFFSET,
            0x6000_0020,
        );
        for index in 0..self.padding_sections {
            let at = table + 40 * (index + 1);
            write_section_header(
                &mut image[at..at + 40],
                &format!(".pad{index}"),
                FILE_ALIGNMENT,
                TEXT_RVA + SECTION_ALIGNMENT * (index as u32 + 1),
                FILE_ALIGNMENT,
                TEXT_OFFSET + text_raw + FILE_ALIGNMENT * index as u32,
                0x4000_0040,
            );
        }

        image.extend_from_slice(text);
        for index in 0..self.padding_sections {
            image.extend(std::iter::repeat(0xA0 + index as u8).take(FILE_ALIGNMENT as usize));
        }
        image.extend_from_slice(&self.overlay);
        image
    }

    fn pdb(
        &self,
        guid: [u8; 16],
        entry_point: u32,
        type_system_tables: u64,
        type_system_rows: &[u32; 64],
        methods: &[&FixtureMethod],
        code_sizes: &[u32],
    ) -> Vec<u8> {
        let mut strings = StringHeap::new();
        let mut blobs = BlobHeap::new();
        let mut guids = Vec::new();
        guids.extend_from_slice(&[0x21; 16]); // 1: document hash algorithm
        guids.extend_from_slice(&[0x22; 16]); // 2: document language
        guids.extend_from_slice(&[0x23; 16]); // 3: custom debug information kind
        guids.extend_from_slice(&ASYNC_STEPPING_KIND); // 4: async method stepping

        let mut rows = [0u32; 64];
        let mut data: Vec<(usize, Vec<u8>)> = Vec::new();

        // Document
        let part = blobs.add(b"fixture.cs");
        let name = blobs.add(&[b'/', part as u8]);
        let mut document = Vec::new();
        push16(&mut document, name);
        push16(&mut document, 1);
        push16(&mut document, blobs.add(&[0xAB; 32]));
        push16(&mut document, 2);
        rows[0x30] = 1;
        data.push((0x30, document));

        // MethodDebugInformation, one row per MethodDef
        let sequence_points = blobs.add(&[0x00, 0x01, 0x00, 0x01, 0x05]);
        let mut method_debug = Vec::new();
        for method in methods {
            let has_body = !matches!(method.body, FixtureBody::Abstract);
            push16(&mut method_debug, u16::from(has_body));
            push16(&mut method_debug, if has_body { sequence_points } else { 0 });
        }
        rows[0x31] = methods.len() as u32;
        data.push((0x31, method_debug));

        // LocalScope, one per method body
        let mut local_scope = Vec::new();
        let mut scope_count = 0;
        for (index, size) in code_sizes.iter().enumerate() {
            if *size == 0 {
                continue;
            }
            push16(&mut local_scope, index as u16 + 1);
            push16(&mut local_scope, 1);
            push16(&mut local_scope, 1);
            push16(&mut local_scope, 1);
            push32(&mut local_scope, 0);
            push32(&mut local_scope, *size);
            scope_count += 1;
        }
        if scope_count > 0 {
            rows[0x32] = scope_count;
            data.push((0x32, local_scope));
        }

        // ImportScope
        let mut import_scope = Vec::new();
        push16(&mut import_scope, 0);
        push16(&mut import_scope, 0);
        rows[0x35] = 1;
        data.push((0x35, import_scope));

        // StateMachineMethod: Caller -> Go
        if let (Some(move_next), Some(kickoff)) = (self.method_rid("Caller"), self.method_rid("Go"))
        {
            let mut state_machine = Vec::new();
            push16(&mut state_machine, move_next as u16);
            push16(&mut state_machine, kickoff as u16);
            rows[0x36] = 1;
            data.push((0x36, state_machine));
        }

        // CustomDebugInformation on every method and on every user type
        let value = blobs.add(&[0x01, 0x02]);
        let mut entries: Vec<(u16, u16, u16)> = Vec::new();
        for index in 0..methods.len() {
            entries.push(((index as u16 + 1) << 5, 3, value));
        }
        for index in 0..self.types.len() {
            entries.push((((index as u16 + 2) << 5) | 3, 3, value));
        }

        // Go resumes in Caller, its state machine
        if let (Some(kickoff), Some(resume)) = (self.method_rid("Go"), self.method_rid("Caller")) {
            let mut stepping = Vec::new();
            push32(&mut stepping, 0);
            push32(&mut stepping, 0x10);
            push32(&mut stepping, 0x20);
            stepping.push(resume as u8);
            entries.push(((kickoff as u16) << 5, 4, blobs.add(&stepping)));
        }

        entries.sort_unstable();
        let mut custom_debug = Vec::new();
        for (parent, kind, value) in &entries {
            push16(&mut custom_debug, *parent);
            push16(&mut custom_debug, *kind);
            push16(&mut custom_debug, *value);
        }
        rows[0x37] = entries.len() as u32;
        data.push((0x37, custom_debug));

        let valid = data.iter().fold(0u64, |mask, (id, _)| mask | (1 << id));
        let sorted = (1u64 << 0x32) | (1u64 << 0x36) | (1u64 << 0x37);
        let tables = tables_stream(valid, sorted, &rows, &data);

        let mut pdb_stream = Vec::new();
        pdb_stream.extend_from_slice(&guid);
        pdb_stream.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        pdb_stream.extend_from_slice(&entry_point.to_le_bytes());
        pdb_stream.extend_from_slice(&type_system_tables.to_le_bytes());
        for (table, count) in type_system_rows.iter().enumerate() {
            if type_system_tables & (1 << table) != 0 {
                pdb_stream.extend_from_slice(&count.to_le_bytes());
            }
        }

        metadata_root(
            "PDB v1.0",
            &[
                ("#Pdb", pdb_stream),
                ("#~", tables),
                ("#Strings", strings.data.clone()),
                ("#US", vec![0, 0, 0, 0]),
                ("#GUID", guids),
                ("#Blob", blobs.data.clone()),
            ],
        )
    }
}

struct StringHeap {
    data: Vec<u8>,
}

impl StringHeap {
    fn new() -> Self {
        StringHeap { data: vec![0] }
    }

    fn add(&mut self, value: &str) -> u16 {
        if value.is_empty() {
            return 0;
        }

        let mut needle = value.as_bytes().to_vec();
        needle.push(0);
        if let Some(position) = self
            .data
            .windows(needle.len())
            .enumerate()
            .position(|(at, window)| window == needle.as_slice() && self.data[at - 1] == 0)
        {
            return position as u16;
        }

        let offset = self.data.len() as u16;
        self.data.extend_from_slice(&needle);
        offset
    }
}

struct BlobHeap {
    data: Vec<u8>,
}

impl BlobHeap {
    fn new() -> Self {
        BlobHeap { data: vec![0] }
    }

    fn add(&mut self, value: &[u8]) -> u16 {
        assert!(value.len() < 0x80, "fixture blobs are small");
        let offset = self.data.len() as u16;
        self.data.push(value.len() as u8);
        self.data.extend_from_slice(value);
        offset
    }
}

fn tables_stream(valid: u64, sorted: u64, rows: &[u32; 64], data: &[(usize, Vec<u8>)]) -> Vec<u8> {
    let mut stream = Vec::new();
    push32(&mut stream, 0);
    stream.push(2);
    stream.push(0);
    stream.push(0);
    stream.push(1);
    stream.extend_from_slice(&valid.to_le_bytes());
    stream.extend_from_slice(&sorted.to_le_bytes());
    for (table, count) in rows.iter().enumerate() {
        if valid & (1 << table) != 0 {
            push32(&mut stream, *count);
        }
    }
    for (_, table) in data {
        stream.extend_from_slice(table);
    }
    align(&mut stream, 4);
    stream
}

fn metadata_root(version: &str, streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut version_bytes = version.as_bytes().to_vec();
    version_bytes.push(0);
    align(&mut version_bytes, 4);

    let mut header_size = 16 + version_bytes.len() + 4;
    for (name, _) in streams {
        header_size += 8 + round_up(name.len() as u32 + 1, 4) as usize;
    }

    let mut root = Vec::new();
    root.extend_from_slice(&0x424A_5342u32.to_le_bytes());
    push16(&mut root, 1);
    push16(&mut root, 1);
    push32(&mut root, 0);
    push32(&mut root, version_bytes.len() as u32);
    root.extend_from_slice(&version_bytes);
    push16(&mut root, 0);
    push16(&mut root, streams.len() as u16);

    let mut offset = header_size;
    for (name, data) in streams {
        let size = round_up(data.len() as u32, 4);
        push32(&mut root, offset as u32);
        push32(&mut root, size);
        let mut name_bytes = name.as_bytes().to_vec();
        name_bytes.push(0);
        align(&mut name_bytes, 4);
        root.extend_from_slice(&name_bytes);
        offset += size as usize;
    }

    for (_, data) in streams {
        root.extend_from_slice(data);
        align(&mut root, 4);
    }
    root
}

fn write_section_header(
    header: &mut [u8],
    name: &str,
    virtual_size: u32,
    virtual_address: u32,
    raw_size: u32,
    raw_pointer: u32,
    characteristics: u32,
) {
    header[..name.len()].copy_from_slice(name.as_bytes());
    put_u32(header, 8, virtual_size);
    put_u32(header, 12, virtual_address);
    put_u32(header, 16, raw_size);
    put_u32(header, 20, raw_pointer);
    put_u32(header, 36, characteristics);
}

fn write_debug_entry(entry: &mut [u8], major: u16, minor: u16, kind: u32, size: u32, rva: u32) {
    put_u16(entry, 8, major);
    put_u16(entry, 10, minor);
    put_u32(entry, 12, kind);
    put_u32(entry, 16, size);
    put_u32(entry, 20, rva);
}

fn align(buffer: &mut Vec<u8>, alignment: usize) {
    while buffer.len() % alignment != 0 {
        buffer.push(0);
    }
}

fn round_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn push16(buffer: &mut Vec<u8>, value: u16) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn push32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn put_u16(buffer: &mut [u8], at: usize, value: u16) {
    buffer[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buffer: &mut [u8], at: usize, value: u32) {
    buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(buffer: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}
