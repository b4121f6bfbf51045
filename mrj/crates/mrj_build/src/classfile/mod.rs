//! Structural view over compiled class files.
//!
//! Only the shape of a type is decoded: modifiers, member names and raw
//! descriptors, and the `Module` attribute. Method bodies and every other
//! attribute are skipped without interpretation.

mod reader;
mod writer;

pub use writer::{ClassFileWriter, MemberSpec};

use crate::module::{ModuleDescriptor, ModuleRequirement, PackageExport, ServiceProvision};
use reader::{skip_attributes, ClassReader, ConstantPool};
use thiserror::Error;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_MODULE: u16 = 0x8000;

const ACC_OPEN: u16 = 0x0020;
const ACC_TRANSITIVE: u16 = 0x0020;
const ACC_STATIC_PHASE: u16 = 0x0040;

pub const CLASS_SUFFIX: &str = ".class";
pub const SIGNATURE_SUFFIX: &str = ".sig";
pub const SOURCE_SUFFIX: &str = ".java";

#[derive(Debug, Error)]
pub enum ClassParseError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("malformed modified UTF-8 in constant pool")]
    MalformedUtf8,
    #[error("module-info missing Module attribute")]
    MissingModuleAttribute,
}

/// A field or method as declared in a class file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryMember {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

impl BinaryMember {
    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }
}

/// Binary type descriptor produced from `.class` or `.sig` content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryType {
    /// Internal name, e.g. `p/q/Type$Inner`.
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access_flags: u16,
    pub major_version: u16,
    pub fields: Vec<BinaryMember>,
    pub methods: Vec<BinaryMember>,
    /// Decoded `Module` attribute, present for module descriptors only.
    pub module: Option<ModuleDescriptor>,
    /// Module the type was loaded from, stamped by the loader when known.
    pub module_name: Option<String>,
}

impl BinaryType {
    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    pub fn is_module_descriptor(&self) -> bool {
        self.access_flags & ACC_MODULE != 0
    }

    /// Dotted name, e.g. `p.q.Type$Inner`.
    pub fn qualified_name(&self) -> String {
        self.name.replace('/', ".")
    }

    /// Dotted package name, empty for the default package.
    pub fn package(&self) -> String {
        self.name
            .rsplit_once('/')
            .map(|(package, _)| package.replace('/', "."))
            .unwrap_or_default()
    }

    pub fn public_methods(&self) -> impl Iterator<Item = &BinaryMember> {
        self.methods.iter().filter(|method| method.is_public())
    }

    pub fn public_fields(&self) -> impl Iterator<Item = &BinaryMember> {
        self.fields.iter().filter(|field| field.is_public())
    }

    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }
}

/// Turns raw descriptor bytes into a [`BinaryType`].
///
/// The archive reader and the API validator only see types through this
/// interface, so tests may substitute synthetic descriptors.
pub trait BinaryTypeReader: Send + Sync {
    fn read(&self, bytes: &[u8], file_name: &str) -> Result<BinaryType, ClassParseError>;
}

/// Reader for the standard class-file format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassFileReader;

impl BinaryTypeReader for ClassFileReader {
    fn read(&self, bytes: &[u8], _file_name: &str) -> Result<BinaryType, ClassParseError> {
        parse_binary_type(bytes)
    }
}

pub fn parse_binary_type(bytes: &[u8]) -> Result<BinaryType, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let major_version = reader.read_u2()?;
    let constant_pool = ConstantPool::parse(&mut reader)?;

    let access_flags = reader.read_u2()?;
    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let index = reader.read_u2()?;
        interfaces.push(constant_pool.class_name(index)?);
    }

    let fields = read_members(&mut reader, &constant_pool)?;
    let methods = read_members(&mut reader, &constant_pool)?;

    let mut module = None;
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let attribute_name_index = reader.read_u2()?;
        let attribute_length = reader.read_u4()? as usize;
        let body = reader.read_slice(attribute_length)?;
        if constant_pool.utf8(attribute_name_index)? == "Module" {
            module = Some(read_module_attribute(body, &constant_pool)?);
        }
    }

    Ok(BinaryType {
        name: constant_pool.class_name(this_class)?,
        super_name: constant_pool.optional_class_name(super_class)?,
        interfaces,
        access_flags,
        major_version,
        fields,
        methods,
        module,
        module_name: None,
    })
}

pub fn parse_module_info(bytes: &[u8]) -> Result<ModuleDescriptor, ClassParseError> {
    parse_binary_type(bytes)?
        .module
        .ok_or(ClassParseError::MissingModuleAttribute)
}

fn read_members(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
) -> Result<Vec<BinaryMember>, ClassParseError> {
    let count = reader.read_u2()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name_index = reader.read_u2()?;
        let descriptor_index = reader.read_u2()?;
        let attributes_count = reader.read_u2()?;

        members.push(BinaryMember {
            name: constant_pool.utf8(name_index)?.to_string(),
            descriptor: constant_pool.utf8(descriptor_index)?.to_string(),
            access_flags,
        });

        skip_attributes(reader, attributes_count)?;
    }
    Ok(members)
}

fn read_module_attribute(
    body: &[u8],
    constant_pool: &ConstantPool,
) -> Result<ModuleDescriptor, ClassParseError> {
    let mut reader = ClassReader::new(body);
    let module_name_index = reader.read_u2()?;
    let module_flags = reader.read_u2()?;
    let _module_version_index = reader.read_u2()?;

    let mut descriptor = ModuleDescriptor::new(constant_pool.module_name(module_name_index)?);
    descriptor.open = module_flags & ACC_OPEN != 0;

    let requires_count = reader.read_u2()?;
    for _ in 0..requires_count {
        let requires_index = reader.read_u2()?;
        let requires_flags = reader.read_u2()?;
        reader.read_u2()?; // requires_version_index
        descriptor.requires.push(ModuleRequirement {
            name: constant_pool.module_name(requires_index)?,
            transitive: requires_flags & ACC_TRANSITIVE != 0,
            is_static: requires_flags & ACC_STATIC_PHASE != 0,
        });
    }

    descriptor.exports = read_package_exports(&mut reader, constant_pool)?;
    descriptor.opens = read_package_exports(&mut reader, constant_pool)?;

    let uses_count = reader.read_u2()?;
    for _ in 0..uses_count {
        let index = reader.read_u2()?;
        descriptor
            .uses
            .push(constant_pool.class_name(index)?.replace('/', "."));
    }

    let provides_count = reader.read_u2()?;
    for _ in 0..provides_count {
        let service = constant_pool.class_name(reader.read_u2()?)?.replace('/', ".");
        let with_count = reader.read_u2()?;
        let mut implementations = Vec::with_capacity(with_count as usize);
        for _ in 0..with_count {
            implementations.push(constant_pool.class_name(reader.read_u2()?)?.replace('/', "."));
        }
        descriptor.provides.push(ServiceProvision {
            service,
            implementations,
        });
    }

    Ok(descriptor)
}

fn read_package_exports(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
) -> Result<Vec<PackageExport>, ClassParseError> {
    let count = reader.read_u2()?;
    let mut exports = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let package_index = reader.read_u2()?;
        reader.read_u2()?; // flags
        let targets_count = reader.read_u2()?;
        let mut targets = Vec::with_capacity(targets_count as usize);
        for _ in 0..targets_count {
            targets.push(constant_pool.module_name(reader.read_u2()?)?);
        }
        exports.push(PackageExport {
            package: constant_pool.package_name(package_index)?.replace('/', "."),
            targets,
        });
    }
    Ok(exports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleRequirement;

    #[test]
    fn parses_public_and_private_members() {
        let bytes = ClassFileWriter::new("p/Greeter")
            .method(MemberSpec::public("sayHello", "()Ljava/lang/String;"))
            .method(MemberSpec::private("helper", "()V"))
            .field(MemberSpec::public("NAME", "Ljava/lang/String;").with_static())
            .to_bytes();

        let parsed = parse_binary_type(&bytes).unwrap();
        assert_eq!(parsed.name, "p/Greeter");
        assert_eq!(parsed.qualified_name(), "p.Greeter");
        assert_eq!(parsed.package(), "p");
        assert_eq!(parsed.super_name.as_deref(), Some("java/lang/Object"));
        assert!(parsed.is_public());

        let public: Vec<_> = parsed.public_methods().map(|m| m.name.as_str()).collect();
        assert_eq!(public, vec!["sayHello"]);
        assert_eq!(parsed.methods.len(), 2);
        let field = parsed.public_fields().next().unwrap();
        assert_eq!(field.descriptor, "Ljava/lang/String;");
        assert!(field.is_static());
    }

    #[test]
    fn rejects_bad_magic() {
        let error = parse_binary_type(&[0, 1, 2, 3, 4, 5, 6, 7]).unwrap_err();
        assert!(matches!(error, ClassParseError::InvalidMagic));
    }

    #[test]
    fn truncated_content_is_an_error() {
        let bytes = ClassFileWriter::new("p/T").to_bytes();
        let error = parse_binary_type(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(error, ClassParseError::UnexpectedEof));
    }

    #[test]
    fn module_attribute_round_trips_through_writer() {
        let mut module = ModuleDescriptor::new("com.example.app");
        module.requires.push(ModuleRequirement {
            name: "java.logging".to_string(),
            transitive: true,
            is_static: false,
        });
        module.exports.push(PackageExport {
            package: "com.example.api".to_string(),
            targets: Vec::new(),
        });
        module.exports.push(PackageExport {
            package: "com.example.internal".to_string(),
            targets: vec!["com.example.test".to_string()],
        });
        module.uses.push("com.example.spi.Plugin".to_string());

        let bytes = ClassFileWriter::module_info(&module).to_bytes();
        assert!(parse_binary_type(&bytes).unwrap().is_module_descriptor());
        let parsed = parse_module_info(&bytes).unwrap();
        assert_eq!(parsed, module);
        assert_eq!(
            parsed.unqualified_exports().collect::<Vec<_>>(),
            vec!["com.example.api"]
        );
    }

    #[test]
    fn plain_class_has_no_module_attribute() {
        let bytes = ClassFileWriter::new("p/T").to_bytes();
        assert!(matches!(
            parse_module_info(&bytes),
            Err(ClassParseError::MissingModuleAttribute)
        ));
    }
}
