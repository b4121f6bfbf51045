use super::{ACC_MODULE, ACC_PUBLIC, ACC_STATIC};
use crate::module::{ModuleDescriptor, PackageExport};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

const ACC_PRIVATE: u16 = 0x0002;
const ACC_SUPER: u16 = 0x0020;
const JAVA_8_MAJOR: u16 = 52;
const JAVA_9_MAJOR: u16 = 53;

/// Field or method declaration emitted by [`ClassFileWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSpec {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

impl MemberSpec {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access_flags: u16) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags,
        }
    }

    pub fn public(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self::new(name, descriptor, ACC_PUBLIC)
    }

    pub fn private(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self::new(name, descriptor, ACC_PRIVATE)
    }

    pub fn package_private(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self::new(name, descriptor, 0)
    }

    pub fn with_static(mut self) -> Self {
        self.access_flags |= ACC_STATIC;
        self
    }
}

/// Emits minimal, structurally valid class files: members carry no code
/// and the only attribute ever written is `Module`.
///
/// Used to produce stub descriptors and test fixtures without a JDK.
#[derive(Debug, Clone)]
pub struct ClassFileWriter {
    name: String,
    super_name: Option<String>,
    access_flags: u16,
    major_version: u16,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
    module: Option<ModuleDescriptor>,
}

impl ClassFileWriter {
    /// Public class with the given internal name extending `java/lang/Object`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: Some("java/lang/Object".to_string()),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            major_version: JAVA_8_MAJOR,
            fields: Vec::new(),
            methods: Vec::new(),
            module: None,
        }
    }

    pub fn module_info(module: &ModuleDescriptor) -> Self {
        Self {
            name: crate::module::MODULE_INFO_NAME.to_string(),
            super_name: None,
            access_flags: ACC_MODULE,
            major_version: JAVA_9_MAJOR,
            fields: Vec::new(),
            methods: Vec::new(),
            module: Some(module.clone()),
        }
    }

    pub fn access_flags(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    /// Major version derived from a Java release (`release + 44`).
    pub fn release(mut self, release: u16) -> Self {
        self.major_version = release + 44;
        self
    }

    pub fn field(mut self, field: MemberSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MemberSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pool = ConstantPoolBuilder::default();
        let this_class = pool.class(&self.name);
        let super_class = self
            .super_name
            .as_deref()
            .map(|name| pool.class(name))
            .unwrap_or(0);

        let mut body = Vec::new();
        put_u2(&mut body, self.access_flags);
        put_u2(&mut body, this_class);
        put_u2(&mut body, super_class);
        put_u2(&mut body, 0); // interfaces

        for members in [&self.fields, &self.methods] {
            put_u2(&mut body, members.len() as u16);
            for member in members.iter() {
                put_u2(&mut body, member.access_flags);
                put_u2(&mut body, pool.utf8(&member.name));
                put_u2(&mut body, pool.utf8(&member.descriptor));
                put_u2(&mut body, 0);
            }
        }

        match &self.module {
            Some(module) => {
                put_u2(&mut body, 1);
                let attribute = module_attribute(module, &mut pool);
                put_u2(&mut body, pool.utf8("Module"));
                put_u4(&mut body, attribute.len() as u32);
                body.extend_from_slice(&attribute);
            }
            None => put_u2(&mut body, 0),
        }

        let mut out = Vec::with_capacity(body.len() + 64);
        put_u4(&mut out, 0xCAFE_BABE);
        put_u2(&mut out, 0);
        put_u2(&mut out, self.major_version);
        pool.write(&mut out);
        out.extend_from_slice(&body);
        out
    }

    /// Writes the class file, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes())
    }
}

fn module_attribute(module: &ModuleDescriptor, pool: &mut ConstantPoolBuilder) -> Vec<u8> {
    let mut out = Vec::new();
    put_u2(&mut out, pool.module(&module.name));
    put_u2(&mut out, if module.open { 0x0020 } else { 0 });
    put_u2(&mut out, 0);

    put_u2(&mut out, module.requires.len() as u16);
    for requirement in &module.requires {
        let mut flags = 0;
        if requirement.transitive {
            flags |= 0x0020;
        }
        if requirement.is_static {
            flags |= 0x0040;
        }
        put_u2(&mut out, pool.module(&requirement.name));
        put_u2(&mut out, flags);
        put_u2(&mut out, 0);
    }

    for exports in [&module.exports, &module.opens] {
        write_package_exports(&mut out, exports, pool);
    }

    put_u2(&mut out, module.uses.len() as u16);
    for service in &module.uses {
        put_u2(&mut out, pool.class(&service.replace('.', "/")));
    }

    put_u2(&mut out, module.provides.len() as u16);
    for provision in &module.provides {
        put_u2(&mut out, pool.class(&provision.service.replace('.', "/")));
        put_u2(&mut out, provision.implementations.len() as u16);
        for implementation in &provision.implementations {
            put_u2(&mut out, pool.class(&implementation.replace('.', "/")));
        }
    }
    out
}

fn write_package_exports(
    out: &mut Vec<u8>,
    exports: &[PackageExport],
    pool: &mut ConstantPoolBuilder,
) {
    put_u2(out, exports.len() as u16);
    for export in exports {
        put_u2(out, pool.package(&export.package.replace('.', "/")));
        put_u2(out, 0);
        put_u2(out, export.targets.len() as u16);
        for target in &export.targets {
            put_u2(out, pool.module(target));
        }
    }
}

#[derive(Default)]
struct ConstantPoolBuilder {
    entries: Vec<Vec<u8>>,
    lookup: HashMap<(u8, String), u16>,
}

impl ConstantPoolBuilder {
    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.lookup.get(&(1, value.to_string())) {
            return *index;
        }
        let mut entry = vec![1];
        put_u2(&mut entry, value.len() as u16);
        entry.extend_from_slice(value.as_bytes());
        self.push(1, value, entry)
    }

    fn class(&mut self, name: &str) -> u16 {
        self.named(7, name)
    }

    fn module(&mut self, name: &str) -> u16 {
        self.named(19, name)
    }

    fn package(&mut self, name: &str) -> u16 {
        self.named(20, name)
    }

    fn named(&mut self, tag: u8, name: &str) -> u16 {
        if let Some(index) = self.lookup.get(&(tag, name.to_string())) {
            return *index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![tag];
        put_u2(&mut entry, name_index);
        self.push(tag, name, entry)
    }

    fn push(&mut self, tag: u8, key: &str, entry: Vec<u8>) -> u16 {
        self.entries.push(entry);
        let index = self.entries.len() as u16;
        self.lookup.insert((tag, key.to_string()), index);
        index
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.entries.len() as u16 + 1);
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
