use super::ClassParseError;

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    Other,
    Unusable,
}

pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassParseError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    Constant::Utf8(decode_modified_utf8(bytes)?)
                }
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    // long and double occupy two slots
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                8 | 16 => {
                    reader.read_u2()?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                19 => Constant::Module {
                    name_index: reader.read_u2()?,
                },
                20 => Constant::Package {
                    name_index: reader.read_u2()?,
                },
                other => return Err(ClassParseError::UnsupportedConstant { tag: other }),
            };

            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassParseError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::InvalidConstantIndex { index })
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Result<String, ClassParseError> {
        match self.get(index)? {
            Constant::Class { name_index } => Ok(self.utf8(*name_index)?.to_string()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn optional_class_name(
        &self,
        index: u16,
    ) -> Result<Option<String>, ClassParseError> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }

    pub(crate) fn package_name(&self, index: u16) -> Result<String, ClassParseError> {
        match self.get(index)? {
            Constant::Package { name_index } | Constant::Class { name_index } => {
                Ok(self.utf8(*name_index)?.to_string())
            }
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn module_name(&self, index: u16) -> Result<String, ClassParseError> {
        match self.get(index)? {
            Constant::Module { name_index } => Ok(self.utf8(*name_index)?.to_string()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }
}

pub(crate) struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn expect_magic(&mut self) -> Result<(), ClassParseError> {
        const MAGIC: u32 = 0xCAFEBABE;
        if self.read_u4()? != MAGIC {
            return Err(ClassParseError::InvalidMagic);
        }
        Ok(())
    }

    pub(crate) fn read_u1(&mut self) -> Result<u8, ClassParseError> {
        let value = *self
            .data
            .get(self.pos)
            .ok_or(ClassParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn read_u2(&mut self) -> Result<u16, ClassParseError> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u4(&mut self) -> Result<u32, ClassParseError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassParseError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassParseError::UnexpectedEof)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ClassParseError> {
        self.read_slice(len).map(|_| ())
    }
}

pub(crate) fn skip_attributes(
    reader: &mut ClassReader<'_>,
    count: u16,
) -> Result<(), ClassParseError> {
    for _ in 0..count {
        reader.read_u2()?; // attribute_name_index
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}

/// Decodes the JVM's modified UTF-8 (`0xC0 0x80` for NUL, surrogate pairs
/// encoded as two three-byte sequences).
fn decode_modified_utf8(bytes: &[u8]) -> Result<String, ClassParseError> {
    if let Ok(plain) = std::str::from_utf8(bytes) {
        return Ok(plain.to_string());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        let (unit, width) = if byte & 0x80 == 0 {
            (u16::from(byte), 1)
        } else if byte & 0xE0 == 0xC0 {
            let next = *bytes.get(index + 1).ok_or(ClassParseError::MalformedUtf8)?;
            ((u16::from(byte & 0x1F) << 6) | u16::from(next & 0x3F), 2)
        } else if byte & 0xF0 == 0xE0 {
            let second = *bytes.get(index + 1).ok_or(ClassParseError::MalformedUtf8)?;
            let third = *bytes.get(index + 2).ok_or(ClassParseError::MalformedUtf8)?;
            (
                (u16::from(byte & 0x0F) << 12)
                    | (u16::from(second & 0x3F) << 6)
                    | u16::from(third & 0x3F),
                3,
            )
        } else {
            return Err(ClassParseError::MalformedUtf8);
        };
        units.push(unit);
        index += width;
    }

    String::from_utf16(&units).map_err(|_| ClassParseError::MalformedUtf8)
}
