//! OLE property set streams (`\u{5}SummaryInformation` and friends)
//!
//! ```text
//! ┌────────┬──────────┬────────────────────────────────────────┐
//! │ Offset │ Size     │ Description                            │
//! ├────────┼──────────┼────────────────────────────────────────┤
//! │ 0x00   │ 2 bytes  │ Byte order mark 0xFFFE                 │
//! │ 0x02   │ 2 bytes  │ Version (0 or 1)                       │
//! │ 0x04   │ 4 bytes  │ System identifier                      │
//! │ 0x08   │ 16 bytes │ Class id                               │
//! │ 0x18   │ 4 bytes  │ Number of sections (1 or 2)            │
//! │ 0x1C   │ 20 * n   │ Format id + section offset, per section│
//! └────────┴──────────┴────────────────────────────────────────┘
//! ```
//!
//! Each section starts with its byte size and property count, followed by
//! `(property id, offset)` pairs. Offsets are relative to the section start.
//! Property 0 is the dictionary (custom property names), property 1 the
//! code page of every string in the section.
//!
//! All integers are little-endian. Values this codec does not interpret are
//! kept as raw bytes and written back unchanged, except that code-page strings
//! inside string vectors are re-encoded when a section moves to UTF-8.

use encoding_rs::{Encoding, WINDOWS_1252};
use std::collections::BTreeMap;
use thiserror::Error;

pub const BYTE_ORDER_MARK: u16 = 0xFFFE;
const HEADER_SIZE: usize = 28;
const SECTION_ENTRY_SIZE: usize = 20;
const MAX_SECTIONS: u32 = 2;

pub const PID_DICTIONARY: u32 = 0;
pub const PID_CODEPAGE: u32 = 1;
/// Ids from here on are reserved (locale, behavior flags)
const PID_RESERVED_START: u32 = 0x8000_0000;
/// First id available for user-defined properties
const PID_FIRST_CUSTOM: u32 = 2;

pub const CP_UTF16: u16 = 1200;
pub const CP_WINDOWS_1252: u16 = 1252;
pub const CP_UTF8: u16 = 65001;

pub const VT_I2: u16 = 0x0002;
pub const VT_I4: u16 = 0x0003;
pub const VT_BOOL: u16 = 0x000B;
pub const VT_UI4: u16 = 0x0013;
pub const VT_LPSTR: u16 = 0x001E;
pub const VT_LPWSTR: u16 = 0x001F;
pub const VT_FILETIME: u16 = 0x0040;
const VT_BSTR: u16 = 0x0008;
const VT_VARIANT: u16 = 0x000C;
const VT_VECTOR: u16 = 0x1000;
/// Strips the vector and array flags
const VT_TYPE_MASK: u16 = 0x0FFF;

#[derive(Debug, Error)]
pub enum PropertySetError {
    #[error("unexpected end of property set at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("invalid byte order mark: expected 0xFFFE, got {found:#06X}")]
    InvalidByteOrder { found: u16 },

    #[error("unsupported section count {0}")]
    BadSectionCount(u32),

    #[error("offset {offset} points outside its section")]
    BadOffset { offset: usize },

    #[error("property {id} holds strings that cannot be moved off code page {code_page}")]
    Unencodable { id: u32, code_page: u16 },
}

type Result<T> = std::result::Result<T, PropertySetError>;

/// 128-bit class / format identifier, kept in on-disk byte order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClassId([u8; 16]);

impl ClassId {
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let a = d1.to_le_bytes();
        let b = d2.to_le_bytes();
        let c = d3.to_le_bytes();
        Self([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d4[0], d4[1], d4[2], d4[3], d4[4],
            d4[5], d4[6], d4[7],
        ])
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// {F29F85E0-4FF9-1068-AB91-08002B27B3D9}
pub const FMTID_SUMMARY_INFORMATION: ClassId = ClassId::from_fields(
    0xF29F_85E0,
    0x4FF9,
    0x1068,
    [0xAB, 0x91, 0x08, 0x00, 0x2B, 0x27, 0xB3, 0xD9],
);

/// {D5CDD502-2E9C-101B-9397-08002B2CF9AE}
pub const FMTID_DOC_SUMMARY_INFORMATION: ClassId = ClassId::from_fields(
    0xD5CD_D502,
    0x2E9C,
    0x101B,
    [0x93, 0x97, 0x08, 0x00, 0x2B, 0x2C, 0xF9, 0xAE],
);

/// {D5CDD505-2E9C-101B-9397-08002B2CF9AE}, second section of the document summary
pub const FMTID_USER_DEFINED_PROPERTIES: ClassId = ClassId::from_fields(
    0xD5CD_D505,
    0x2E9C,
    0x101B,
    [0x93, 0x97, 0x08, 0x00, 0x2B, 0x2C, 0xF9, 0xAE],
);

/// A typed property value
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    I2(i16),
    I4(i32),
    UI4(u32),
    Bool(bool),
    /// Code-page string; the encoding follows the section's code page
    Lpstr(String),
    Lpwstr(String),
    /// 100ns ticks since 1601-01-01 UTC
    Filetime(u64),
    /// Anything else, bytes following the type header (padding included)
    Other { vt: u16, data: Vec<u8> },
}

impl PropertyValue {
    pub fn vt(&self) -> u16 {
        match self {
            PropertyValue::I2(_) => VT_I2,
            PropertyValue::I4(_) => VT_I4,
            PropertyValue::UI4(_) => VT_UI4,
            PropertyValue::Bool(_) => VT_BOOL,
            PropertyValue::Lpstr(_) => VT_LPSTR,
            PropertyValue::Lpwstr(_) => VT_LPWSTR,
            PropertyValue::Filetime(_) => VT_FILETIME,
            PropertyValue::Other { vt, .. } => *vt,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Lpstr(s) | PropertyValue::Lpwstr(s) => Some(s),
            _ => None,
        }
    }
}

/// One section: a code page, an optional dictionary and its properties
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    format_id: ClassId,
    code_page: u16,
    dictionary: BTreeMap<u32, String>,
    properties: Vec<(u32, PropertyValue)>,
}

impl Section {
    pub fn new(format_id: ClassId) -> Self {
        Self {
            format_id,
            code_page: CP_WINDOWS_1252,
            dictionary: BTreeMap::new(),
            properties: Vec::new(),
        }
    }

    pub fn format_id(&self) -> ClassId {
        self.format_id
    }

    pub fn code_page(&self) -> u16 {
        self.code_page
    }

    pub fn get(&self, id: u32) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, value)| value)
    }

    /// Replace the value of `id`, or append it
    pub fn set(&mut self, id: u32, value: PropertyValue) {
        match self.properties.iter_mut().find(|(pid, _)| *pid == id) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((id, value)),
        }
    }

    pub fn remove(&mut self, id: u32) -> Option<PropertyValue> {
        let index = self.properties.iter().position(|(pid, _)| *pid == id)?;
        self.dictionary.remove(&id);
        Some(self.properties.remove(index).1)
    }

    pub fn properties(&self) -> impl Iterator<Item = (u32, &PropertyValue)> {
        self.properties.iter().map(|(id, value)| (*id, value))
    }

    /// Dictionary lookup; names compare case-insensitively
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.dictionary
            .iter()
            .find(|(_, entry)| entry.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    /// Named (dictionary) properties in id order
    pub fn named_properties(&self) -> Vec<(&str, &PropertyValue)> {
        self.dictionary
            .iter()
            .filter_map(|(id, name)| self.get(*id).map(|value| (name.as_str(), value)))
            .collect()
    }

    pub fn get_named(&self, name: &str) -> Option<&PropertyValue> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    /// Set a named property, allocating a fresh id for new names
    pub fn set_named(&mut self, name: &str, value: PropertyValue) -> u32 {
        let id = match self.id_of(name) {
            Some(id) => id,
            None => {
                let id = self.next_free_id();
                self.dictionary.insert(id, name.to_string());
                id
            }
        };
        self.set(id, value);
        id
    }

    fn next_free_id(&self) -> u32 {
        self.properties
            .iter()
            .map(|(id, _)| *id)
            .chain(self.dictionary.keys().copied())
            .filter(|id| *id < PID_RESERVED_START)
            .max()
            .map_or(PID_FIRST_CUSTOM, |max| (max + 1).max(PID_FIRST_CUSTOM))
    }

    /// Whether `text` can be stored without breaking the values already here
    pub fn can_encode(&self, text: &str) -> bool {
        self.target_code_page(Some(text)).is_ok()
    }

    /// Code page used when writing. A byte page that cannot hold every string
    /// is promoted to UTF-8, which is only possible when every raw value
    /// carrying code-page strings can be re-encoded.
    fn target_code_page(&self, pending: Option<&str>) -> Result<u16> {
        let mut strings = self
            .properties
            .iter()
            .filter_map(|(_, value)| match value {
                PropertyValue::Lpstr(s) => Some(s.as_str()),
                _ => None,
            })
            .chain(self.dictionary.values().map(String::as_str))
            .chain(pending);
        if strings.all(|s| fits_code_page(s, self.code_page)) {
            return Ok(self.code_page);
        }

        for (id, value) in &self.properties {
            let PropertyValue::Other { vt, data } = value else {
                continue;
            };
            if transcode_blob(*vt, data, self.code_page, CP_UTF8).is_none() {
                return Err(PropertySetError::Unencodable {
                    id: *id,
                    code_page: self.code_page,
                });
            }
        }
        Ok(CP_UTF8)
    }

    fn parse(data: &[u8], format_id: ClassId, start: usize) -> Result<Self> {
        let size = read_u32(data, start)? as usize;
        let end = start
            .checked_add(size)
            .filter(|end| *end <= data.len())
            .ok_or(PropertySetError::BadOffset { offset: start })?;
        let section = &data[start..end];
        let count = read_u32(section, 4)? as usize;

        let mut entries = Vec::with_capacity(count.min(1024));
        for i in 0..count {
            let id = read_u32(section, 8 + i * 8)?;
            let offset = read_u32(section, 12 + i * 8)? as usize;
            if offset >= section.len() {
                return Err(PropertySetError::BadOffset { offset });
            }
            entries.push((id, offset));
        }

        // Values have no length of their own for unknown types: each one
        // runs up to the next value in the section
        let mut boundaries: Vec<usize> = entries.iter().map(|(_, offset)| *offset).collect();
        boundaries.push(section.len());
        boundaries.sort_unstable();
        boundaries.dedup();
        let value_end = |offset: usize| {
            boundaries
                .iter()
                .copied()
                .find(|b| *b > offset)
                .unwrap_or(section.len())
        };

        let mut code_page = CP_WINDOWS_1252;
        if let Some((_, offset)) = entries.iter().find(|(id, _)| *id == PID_CODEPAGE) {
            if let PropertyValue::I2(cp) = parse_value(section, *offset, value_end(*offset), 0)? {
                code_page = cp as u16;
            }
        }

        let mut dictionary = BTreeMap::new();
        let mut properties = Vec::new();
        for (id, offset) in entries {
            match id {
                PID_CODEPAGE => {}
                PID_DICTIONARY => {
                    dictionary = parse_dictionary(section, offset, code_page)?;
                }
                _ => {
                    let value = parse_value(section, offset, value_end(offset), code_page)?;
                    properties.push((id, value));
                }
            }
        }

        Ok(Self {
            format_id,
            code_page,
            dictionary,
            properties,
        })
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let code_page = self.target_code_page(None)?;

        let mut blobs: Vec<(u32, Vec<u8>)> = Vec::with_capacity(self.properties.len() + 2);
        if !self.dictionary.is_empty() {
            blobs.push((PID_DICTIONARY, encode_dictionary(&self.dictionary, code_page)));
        }
        blobs.push((
            PID_CODEPAGE,
            encode_value(&PropertyValue::I2(code_page as i16), code_page),
        ));
        for (id, value) in &self.properties {
            let blob = match value {
                PropertyValue::Other { vt, data } if code_page != self.code_page => {
                    let data = transcode_blob(*vt, data, self.code_page, code_page).ok_or(
                        PropertySetError::Unencodable {
                            id: *id,
                            code_page: self.code_page,
                        },
                    )?;
                    encode_value(&PropertyValue::Other { vt: *vt, data }, code_page)
                }
                _ => encode_value(value, code_page),
            };
            blobs.push((*id, blob));
        }

        let table_size = 8 + blobs.len() * 8;
        let total: usize = table_size + blobs.iter().map(|(_, blob)| blob.len()).sum::<usize>();

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(blobs.len() as u32).to_le_bytes());

        let mut offset = table_size;
        for (id, blob) in &blobs {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += blob.len();
        }
        for (_, blob) in blobs {
            out.extend_from_slice(&blob);
        }

        Ok(out)
    }
}

/// A whole property set stream
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySet {
    version: u16,
    system_id: u32,
    class_id: ClassId,
    sections: Vec<Section>,
}

impl PropertySet {
    /// Empty set with a single section
    pub fn new(format_id: ClassId) -> Self {
        Self {
            version: 0,
            system_id: 0,
            class_id: ClassId::default(),
            sections: vec![Section::new(format_id)],
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let byte_order = read_u16(data, 0)?;
        if byte_order != BYTE_ORDER_MARK {
            return Err(PropertySetError::InvalidByteOrder { found: byte_order });
        }

        let version = read_u16(data, 2)?;
        let system_id = read_u32(data, 4)?;
        let class_id = read_class_id(data, 8)?;
        let count = read_u32(data, 24)?;
        if count == 0 || count > MAX_SECTIONS {
            return Err(PropertySetError::BadSectionCount(count));
        }

        let mut sections = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let entry = HEADER_SIZE + i * SECTION_ENTRY_SIZE;
            let format_id = read_class_id(data, entry)?;
            let offset = read_u32(data, entry + 16)? as usize;
            sections.push(Section::parse(data, format_id, offset)?);
        }

        Ok(Self {
            version,
            system_id,
            class_id,
            sections,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let encoded = self
            .sections
            .iter()
            .map(Section::to_bytes)
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::new();
        out.extend_from_slice(&BYTE_ORDER_MARK.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.system_id.to_le_bytes());
        out.extend_from_slice(self.class_id.as_bytes());
        out.extend_from_slice(&(self.sections.len() as u32).to_le_bytes());

        let mut offset = HEADER_SIZE + self.sections.len() * SECTION_ENTRY_SIZE;
        for (section, bytes) in self.sections.iter().zip(&encoded) {
            out.extend_from_slice(section.format_id.as_bytes());
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += bytes.len();
        }
        for bytes in encoded {
            out.extend_from_slice(&bytes);
        }

        Ok(out)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, format_id: ClassId) -> Option<&Section> {
        self.sections.iter().find(|s| s.format_id == format_id)
    }

    /// Section with the given format id, appended if missing
    pub fn section_mut(&mut self, format_id: ClassId) -> &mut Section {
        let index = match self.sections.iter().position(|s| s.format_id == format_id) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(format_id));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }
}

fn read_bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(PropertySetError::UnexpectedEof { offset })
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let b = read_bytes(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let b = read_bytes(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    let lo = read_u32(data, offset)? as u64;
    let hi = read_u32(data, offset + 4)? as u64;
    Ok(hi << 32 | lo)
}

fn read_class_id(data: &[u8], offset: usize) -> Result<ClassId> {
    let mut id = [0u8; 16];
    id.copy_from_slice(read_bytes(data, offset, 16)?);
    Ok(ClassId(id))
}

fn parse_value(section: &[u8], offset: usize, end: usize, code_page: u16) -> Result<PropertyValue> {
    let vt = read_u16(section, offset)?;
    let body = offset + 4;

    let value = match vt {
        VT_I2 => PropertyValue::I2(read_u16(section, body)? as i16),
        VT_I4 => PropertyValue::I4(read_u32(section, body)? as i32),
        VT_UI4 => PropertyValue::UI4(read_u32(section, body)?),
        VT_BOOL => PropertyValue::Bool(read_u16(section, body)? != 0),
        VT_FILETIME => PropertyValue::Filetime(read_u64(section, body)?),
        VT_LPSTR => {
            let size = read_u32(section, body)? as usize;
            let bytes = read_bytes(section, body + 4, size)?;
            PropertyValue::Lpstr(decode_code_page(bytes, code_page))
        }
        VT_LPWSTR => {
            let chars = read_u32(section, body)? as usize;
            let len = chars
                .checked_mul(2)
                .ok_or(PropertySetError::BadOffset { offset: body })?;
            let bytes = read_bytes(section, body + 4, len)?;
            PropertyValue::Lpwstr(decode_utf16(bytes))
        }
        _ => {
            let data = section
                .get(body.min(end)..end)
                .ok_or(PropertySetError::BadOffset { offset })?;
            PropertyValue::Other {
                vt,
                data: data.to_vec(),
            }
        }
    };

    Ok(value)
}

fn parse_dictionary(section: &[u8], offset: usize, code_page: u16) -> Result<BTreeMap<u32, String>> {
    let count = read_u32(section, offset)? as usize;
    let mut pos = offset + 4;
    let mut dictionary = BTreeMap::new();

    for _ in 0..count {
        let id = read_u32(section, pos)?;
        let chars = read_u32(section, pos + 4)? as usize;
        pos += 8;

        let name = if code_page == CP_UTF16 {
            let len = chars
                .checked_mul(2)
                .ok_or(PropertySetError::BadOffset { offset: pos })?;
            let name = decode_utf16(read_bytes(section, pos, len)?);
            pos += pad4(len);
            name
        } else {
            let name = decode_code_page(read_bytes(section, pos, chars)?, code_page);
            pos += chars;
            name
        };

        dictionary.insert(id, name);
    }

    Ok(dictionary)
}

fn encode_value(value: &PropertyValue, code_page: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&value.vt().to_le_bytes());
    out.extend_from_slice(&[0, 0]);

    match value {
        PropertyValue::I2(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropertyValue::I4(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropertyValue::UI4(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropertyValue::Bool(v) => {
            let raw: u16 = if *v { 0xFFFF } else { 0 };
            out.extend_from_slice(&raw.to_le_bytes());
        }
        PropertyValue::Filetime(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropertyValue::Lpstr(s) => {
            let bytes = encode_code_page(s, code_page);
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        PropertyValue::Lpwstr(s) => {
            let bytes = encode_utf16(s);
            out.extend_from_slice(&((bytes.len() / 2) as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        PropertyValue::Other { data, .. } => out.extend_from_slice(data),
    }

    out.resize(pad4(out.len()), 0);
    out
}

fn encode_dictionary(dictionary: &BTreeMap<u32, String>, code_page: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(dictionary.len() as u32).to_le_bytes());

    for (id, name) in dictionary {
        out.extend_from_slice(&id.to_le_bytes());
        if code_page == CP_UTF16 {
            let bytes = encode_utf16(name);
            out.extend_from_slice(&((bytes.len() / 2) as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
            out.resize(pad4(out.len()), 0);
        } else {
            let bytes = encode_code_page(name, code_page);
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
        }
    }

    out.resize(pad4(out.len()), 0);
    out
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Encoding behind a byte code page; unknown pages read as Windows-1252
fn encoding_for(code_page: u16) -> &'static Encoding {
    codepage::to_encoding(code_page).unwrap_or(WINDOWS_1252)
}

/// Bytes up to the first NUL, decoded per code page
fn decode_code_page(bytes: &[u8], code_page: u16) -> String {
    if code_page == CP_UTF16 {
        return decode_utf16(bytes);
    }

    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    let (text, _) = encoding_for(code_page).decode_without_bom_handling(&bytes[..end]);
    text.into_owned()
}

/// NUL-terminated encoding per code page
fn encode_code_page(s: &str, code_page: u16) -> Vec<u8> {
    if code_page == CP_UTF16 {
        return encode_utf16(s);
    }

    let (bytes, _, _) = encoding_for(code_page).encode(s);
    let mut bytes = bytes.into_owned();
    bytes.push(0);
    bytes
}

fn fits_code_page(s: &str, code_page: u16) -> bool {
    match code_page {
        CP_UTF16 | CP_UTF8 => true,
        _ => !encoding_for(code_page).encode(s).2,
    }
}

/// Raw value bytes moved from one code page to another. Values without
/// code-page strings come back unchanged; `None` when strings are present in
/// a layout this codec does not walk.
fn transcode_blob(vt: u16, data: &[u8], from: u16, to: u16) -> Option<Vec<u8>> {
    if !matches!(vt & VT_TYPE_MASK, VT_LPSTR | VT_BSTR | VT_VARIANT) {
        return Some(data.to_vec());
    }
    if vt != VT_VECTOR | VT_LPSTR && vt != VT_VECTOR | VT_VARIANT {
        return None;
    }

    // Writers disagree on whether vector elements are padded to 4 bytes
    [false, true]
        .into_iter()
        .find_map(|padded| transcode_vector(vt & VT_TYPE_MASK, data, from, to, padded))
}

fn transcode_vector(element: u16, data: &[u8], from: u16, to: u16, padded: bool) -> Option<Vec<u8>> {
    let align = |n: usize| if padded { pad4(n) } else { n };
    let count = read_u32(data, 0).ok()?;
    let mut out = count.to_le_bytes().to_vec();
    let mut pos = 4;

    for _ in 0..count {
        let vt = if element == VT_VARIANT {
            let vt = read_u16(data, pos).ok()?;
            out.extend_from_slice(read_bytes(data, pos, 4).ok()?);
            pos += 4;
            vt
        } else {
            VT_LPSTR
        };

        match vt {
            VT_LPSTR => {
                let size = read_u32(data, pos).ok()? as usize;
                let text = decode_code_page(read_bytes(data, pos + 4, size).ok()?, from);
                let encoded = encode_code_page(&text, to);
                pos = align(pos + 4 + size);
                out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
                out.extend_from_slice(&encoded);
            }
            VT_LPWSTR => {
                let chars = read_u32(data, pos).ok()? as usize;
                let len = 4 + chars.checked_mul(2)?;
                out.extend_from_slice(read_bytes(data, pos, len).ok()?);
                pos = align(pos + len);
            }
            VT_I2 | VT_BOOL | VT_I4 | VT_UI4 => {
                out.extend_from_slice(read_bytes(data, pos, 4).ok()?);
                pos += 4;
            }
            VT_FILETIME => {
                out.extend_from_slice(read_bytes(data, pos, 8).ok()?);
                pos += 8;
            }
            _ => return None,
        }
        out.resize(align(out.len()), 0);
    }

    data.get(pos..)?.iter().all(|b| *b == 0).then_some(out)
}

fn decode_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

fn encode_utf16(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}
