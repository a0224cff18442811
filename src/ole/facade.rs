use cfb::CompoundFile;
use chrono::{DateTime, Utc};
use std::io::{Cursor, Read, Write};

use super::property_set::{
    FMTID_DOC_SUMMARY_INFORMATION, FMTID_SUMMARY_INFORMATION, FMTID_USER_DEFINED_PROPERTIES,
    PropertySet, PropertyValue, Section,
};
use crate::content::ContentOutput;
use crate::handlers::{ContentFacade, HandlerError, MetadataValue};

pub const SUMMARY_STREAM: &str = "/\u{5}SummaryInformation";
pub const DOC_SUMMARY_STREAM: &str = "/\u{5}DocumentSummaryInformation";

/// 100ns ticks between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH: i128 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i128 = 10_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    Summary,
    DocSummary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Text,
    Timestamp,
}

/// Named fields of the two standard property sets
const STANDARD_FIELDS: &[(&str, Stream, u32, Kind)] = &[
    ("title", Stream::Summary, 0x02, Kind::Text),
    ("subject", Stream::Summary, 0x03, Kind::Text),
    ("author", Stream::Summary, 0x04, Kind::Text),
    ("keywords", Stream::Summary, 0x05, Kind::Text),
    ("comments", Stream::Summary, 0x06, Kind::Text),
    ("template", Stream::Summary, 0x07, Kind::Text),
    ("last_author", Stream::Summary, 0x08, Kind::Text),
    ("revision_number", Stream::Summary, 0x09, Kind::Text),
    ("last_printed", Stream::Summary, 0x0B, Kind::Timestamp),
    ("created", Stream::Summary, 0x0C, Kind::Timestamp),
    ("last_saved", Stream::Summary, 0x0D, Kind::Timestamp),
    ("application_name", Stream::Summary, 0x12, Kind::Text),
    ("category", Stream::DocSummary, 0x02, Kind::Text),
    ("manager", Stream::DocSummary, 0x0E, Kind::Text),
    ("company", Stream::DocSummary, 0x0F, Kind::Text),
];

fn standard_field(name: &str) -> Option<(&'static str, Stream, u32, Kind)> {
    STANDARD_FIELDS
        .iter()
        .find(|(field, ..)| field.eq_ignore_ascii_case(name))
        .copied()
}

/// Metadata facade over a compound binary file (Word, Excel and PowerPoint
/// 97-2003).
///
/// The whole container is read into memory when the facade is built and the
/// input stream is released right away. Only the summary property set
/// streams are rewritten on [`ContentFacade::save`]; every other stream is
/// carried over untouched.
pub struct OleContentFacade {
    container: CompoundFile<Cursor<Vec<u8>>>,
    summary: PropertySet,
    doc_summary: PropertySet,
    summary_dirty: bool,
    doc_summary_dirty: bool,
    output: Box<dyn ContentOutput>,
}

impl OleContentFacade {
    pub fn open(
        mut input: Box<dyn Read + Send>,
        output: Box<dyn ContentOutput>,
    ) -> Result<Self, HandlerError> {
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;
        drop(input);

        let mut container = CompoundFile::open(Cursor::new(buffer))
            .map_err(|e| HandlerError::Corrupt(e.to_string()))?;

        let summary = read_property_set(&mut container, SUMMARY_STREAM)?
            .unwrap_or_else(|| PropertySet::new(FMTID_SUMMARY_INFORMATION));
        let doc_summary = read_property_set(&mut container, DOC_SUMMARY_STREAM)?
            .unwrap_or_else(|| PropertySet::new(FMTID_DOC_SUMMARY_INFORMATION));

        Ok(Self {
            container,
            summary,
            doc_summary,
            summary_dirty: false,
            doc_summary_dirty: false,
            output,
        })
    }

    fn standard_value(&self, stream: Stream, id: u32) -> Option<&PropertyValue> {
        match stream {
            Stream::Summary => self.summary.section(FMTID_SUMMARY_INFORMATION)?.get(id),
            Stream::DocSummary => self
                .doc_summary
                .section(FMTID_DOC_SUMMARY_INFORMATION)?
                .get(id),
        }
    }

    fn custom_value(&self, name: &str) -> Option<&PropertyValue> {
        self.doc_summary
            .section(FMTID_USER_DEFINED_PROPERTIES)?
            .get_named(name)
    }
}

fn read_property_set(
    container: &mut CompoundFile<Cursor<Vec<u8>>>,
    path: &str,
) -> Result<Option<PropertySet>, HandlerError> {
    if !container.is_stream(path) {
        return Ok(None);
    }

    let mut data = Vec::new();
    container.open_stream(path)?.read_to_end(&mut data)?;
    Ok(Some(PropertySet::parse(&data)?))
}

fn write_property_set(
    container: &mut CompoundFile<Cursor<Vec<u8>>>,
    path: &str,
    set: &PropertySet,
) -> Result<(), HandlerError> {
    let bytes = set.to_bytes()?;
    let mut stream = container.create_stream(path)?;
    stream.write_all(&bytes)?;
    stream.flush()?;
    Ok(())
}

impl ContentFacade for OleContentFacade {
    fn fields(&self) -> Vec<(String, MetadataValue)> {
        let mut fields: Vec<(String, MetadataValue)> = STANDARD_FIELDS
            .iter()
            .filter_map(|(name, stream, id, _)| {
                let value = self.standard_value(*stream, *id).and_then(to_metadata)?;
                Some((name.to_string(), value))
            })
            .collect();

        if let Some(section) = self.doc_summary.section(FMTID_USER_DEFINED_PROPERTIES) {
            fields.extend(
                section
                    .named_properties()
                    .into_iter()
                    .filter_map(|(name, value)| Some((name.to_string(), to_metadata(value)?))),
            );
        }

        fields
    }

    fn read_metadata(&self, field: &str) -> Option<MetadataValue> {
        match standard_field(field) {
            Some((_, stream, id, _)) => self.standard_value(stream, id).and_then(to_metadata),
            None => self.custom_value(field).and_then(to_metadata),
        }
    }

    fn write_metadata(&mut self, field: &str, value: MetadataValue) -> Result<(), HandlerError> {
        if field.trim().is_empty() {
            return Err(HandlerError::InvalidField(field.to_string()));
        }

        match standard_field(field) {
            Some((name, stream, id, kind)) => {
                let value = standard_property(name, kind, value)?;
                match stream {
                    Stream::Summary => {
                        let section = self.summary.section_mut(FMTID_SUMMARY_INFORMATION);
                        check_encodable(section, name, &value)?;
                        section.set(id, value);
                        self.summary_dirty = true;
                    }
                    Stream::DocSummary => {
                        let section = self
                            .doc_summary
                            .section_mut(FMTID_DOC_SUMMARY_INFORMATION);
                        check_encodable(section, name, &value)?;
                        section.set(id, value);
                        self.doc_summary_dirty = true;
                    }
                }
            }
            None => {
                let value = custom_property(field, value)?;
                // The document summary section has to come first
                self.doc_summary.section_mut(FMTID_DOC_SUMMARY_INFORMATION);
                let section = self.doc_summary.section_mut(FMTID_USER_DEFINED_PROPERTIES);
                check_encodable(section, field, &PropertyValue::Lpstr(field.to_string()))?;
                check_encodable(section, field, &value)?;
                section.set_named(field, value);
                self.doc_summary_dirty = true;
            }
        }

        tracing::debug!(field, "Metadata field updated");
        Ok(())
    }

    fn save(self: Box<Self>) -> Result<(), HandlerError> {
        let OleContentFacade {
            mut container,
            summary,
            doc_summary,
            summary_dirty,
            doc_summary_dirty,
            mut output,
        } = *self;

        if summary_dirty {
            write_property_set(&mut container, SUMMARY_STREAM, &summary)?;
        }
        if doc_summary_dirty {
            write_property_set(&mut container, DOC_SUMMARY_STREAM, &doc_summary)?;
        }
        container.flush()?;

        let bytes = container.into_inner().into_inner();
        output.write_all(&bytes)?;
        output.commit()?;

        tracing::info!(
            size = bytes.len(),
            summary_dirty,
            doc_summary_dirty,
            "Saved compound file metadata"
        );
        Ok(())
    }

    fn abort(self: Box<Self>) {
        tracing::debug!("Discarding compound file metadata changes");
    }
}

/// Refuse text the section cannot hold without damaging values already in it
fn check_encodable(section: &Section, field: &str, value: &PropertyValue) -> Result<(), HandlerError> {
    match value {
        PropertyValue::Lpstr(text) if !section.can_encode(text) => Err(HandlerError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "text does not fit code page {} and the section holds values that cannot be re-encoded",
                section.code_page()
            ),
        }),
        _ => Ok(()),
    }
}

fn standard_property(
    field: &str,
    kind: Kind,
    value: MetadataValue,
) -> Result<PropertyValue, HandlerError> {
    let invalid = |reason: &str| HandlerError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    match (kind, value) {
        (Kind::Text, MetadataValue::Text(s)) => Ok(PropertyValue::Lpstr(s)),
        (Kind::Text, MetadataValue::Integer(n)) => Ok(PropertyValue::Lpstr(n.to_string())),
        (Kind::Text, MetadataValue::Boolean(_) | MetadataValue::Timestamp(_)) => {
            Err(invalid("expected text"))
        }
        (Kind::Timestamp, MetadataValue::Timestamp(ts)) => datetime_to_filetime(ts)
            .map(PropertyValue::Filetime)
            .ok_or_else(|| invalid("timestamp before 1601")),
        (Kind::Timestamp, MetadataValue::Text(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .and_then(|ts| datetime_to_filetime(ts.with_timezone(&Utc)))
            .map(PropertyValue::Filetime)
            .ok_or_else(|| invalid("expected an RFC 3339 timestamp")),
        (Kind::Timestamp, _) => Err(invalid("expected a timestamp")),
    }
}

fn custom_property(field: &str, value: MetadataValue) -> Result<PropertyValue, HandlerError> {
    Ok(match value {
        MetadataValue::Text(s) => PropertyValue::Lpstr(s),
        MetadataValue::Integer(n) => PropertyValue::I4(n),
        MetadataValue::Boolean(b) => PropertyValue::Bool(b),
        MetadataValue::Timestamp(ts) => {
            PropertyValue::Filetime(datetime_to_filetime(ts).ok_or_else(|| {
                HandlerError::InvalidValue {
                    field: field.to_string(),
                    reason: "timestamp before 1601".to_string(),
                }
            })?)
        }
    })
}

fn to_metadata(value: &PropertyValue) -> Option<MetadataValue> {
    match value {
        PropertyValue::Lpstr(s) | PropertyValue::Lpwstr(s) => Some(MetadataValue::Text(s.clone())),
        PropertyValue::I2(n) => Some(MetadataValue::Integer(i32::from(*n))),
        PropertyValue::I4(n) => Some(MetadataValue::Integer(*n)),
        PropertyValue::UI4(n) => i32::try_from(*n).ok().map(MetadataValue::Integer),
        PropertyValue::Bool(b) => Some(MetadataValue::Boolean(*b)),
        PropertyValue::Filetime(ticks) => filetime_to_datetime(*ticks).map(MetadataValue::Timestamp),
        PropertyValue::Other { .. } => None,
    }
}

/// Zero means "never" in the summary streams
pub fn filetime_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }

    let since_unix = i128::from(ticks) - FILETIME_UNIX_EPOCH;
    let secs = i64::try_from(since_unix.div_euclid(TICKS_PER_SECOND)).ok()?;
    let nanos = (since_unix.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

pub fn datetime_to_filetime(ts: DateTime<Utc>) -> Option<u64> {
    let ticks = i128::from(ts.timestamp()) * TICKS_PER_SECOND
        + i128::from(ts.timestamp_subsec_nanos() / 100)
        + FILETIME_UNIX_EPOCH;
    u64::try_from(ticks).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::WriteOutput;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    /// Output that hands its bytes back to the test once committed
    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Option<Vec<u8>>>>);

    struct SharedWriter {
        buffer: Vec<u8>,
        target: SharedOutput,
    }

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl ContentOutput for SharedWriter {
        fn commit(self: Box<Self>) -> std::io::Result<()> {
            let writer = *self;
            *writer.target.0.lock().unwrap() = Some(writer.buffer);
            Ok(())
        }
    }

    impl SharedOutput {
        fn writer(&self) -> Box<dyn ContentOutput> {
            Box::new(SharedWriter {
                buffer: Vec::new(),
                target: self.clone(),
            })
        }

        fn committed(&self) -> Option<Vec<u8>> {
            self.0.lock().unwrap().clone()
        }
    }

    fn sample_document(summary: Option<&PropertySet>) -> Vec<u8> {
        let mut container = CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        container
            .create_stream("/WordDocument")
            .unwrap()
            .write_all(b"body text")
            .unwrap();
        if let Some(set) = summary {
            container
                .create_stream(SUMMARY_STREAM)
                .unwrap()
                .write_all(&set.to_bytes().unwrap())
                .unwrap();
        }
        container.flush().unwrap();
        container.into_inner().into_inner()
    }

    fn open(bytes: Vec<u8>, output: Box<dyn ContentOutput>) -> Box<dyn ContentFacade> {
        Box::new(OleContentFacade::open(Box::new(Cursor::new(bytes)), output).unwrap())
    }

    #[test]
    fn test_reads_existing_summary() {
        let mut set = PropertySet::new(FMTID_SUMMARY_INFORMATION);
        set.section_mut(FMTID_SUMMARY_INFORMATION)
            .set(0x02, PropertyValue::Lpstr("Budget 2024".to_string()));
        set.section_mut(FMTID_SUMMARY_INFORMATION)
            .set(0x04, PropertyValue::Lpstr("Finance".to_string()));

        let facade = open(sample_document(Some(&set)), WriteOutput::boxed(Vec::new()));

        assert_eq!(
            facade.read_metadata("title"),
            Some(MetadataValue::Text("Budget 2024".to_string()))
        );
        assert_eq!(
            facade.read_metadata("Author"),
            Some(MetadataValue::Text("Finance".to_string()))
        );
        assert_eq!(facade.read_metadata("subject"), None);
        assert_eq!(facade.fields().len(), 2);
    }

    #[test]
    fn test_save_writes_fields_and_keeps_other_streams() {
        let shared = SharedOutput::default();
        let mut facade = open(sample_document(None), shared.writer());

        facade
            .write_metadata("title", MetadataValue::Text("Minutes".to_string()))
            .unwrap();
        facade
            .write_metadata("company", MetadataValue::Text("Redpill".to_string()))
            .unwrap();
        facade
            .write_metadata("Case Number", MetadataValue::Integer(42))
            .unwrap();
        facade.save().unwrap();

        let saved = shared.committed().expect("output committed");
        let reopened = open(saved.clone(), WriteOutput::boxed(Vec::new()));
        assert_eq!(
            reopened.read_metadata("title"),
            Some(MetadataValue::Text("Minutes".to_string()))
        );
        assert_eq!(
            reopened.read_metadata("company"),
            Some(MetadataValue::Text("Redpill".to_string()))
        );
        assert_eq!(
            reopened.read_metadata("case number"),
            Some(MetadataValue::Integer(42))
        );

        let mut container = CompoundFile::open(Cursor::new(saved)).unwrap();
        let mut body = Vec::new();
        container
            .open_stream("/WordDocument")
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, b"body text");
    }

    #[test]
    fn test_abort_never_commits() {
        let shared = SharedOutput::default();
        let mut facade = open(sample_document(None), shared.writer());
        facade
            .write_metadata("title", MetadataValue::Text("Draft".to_string()))
            .unwrap();
        facade.abort();

        assert!(shared.committed().is_none());
    }

    #[test]
    fn test_timestamps() {
        let shared = SharedOutput::default();
        let mut facade = open(sample_document(None), shared.writer());
        let created = Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap();

        facade
            .write_metadata("created", MetadataValue::Timestamp(created))
            .unwrap();
        facade
            .write_metadata(
                "last_saved",
                MetadataValue::Text("2022-01-02T03:04:05Z".to_string()),
            )
            .unwrap();
        assert!(matches!(
            facade.write_metadata("last_printed", MetadataValue::Text("yesterday".to_string())),
            Err(HandlerError::InvalidValue { .. })
        ));
        assert!(matches!(
            facade.write_metadata("title", MetadataValue::Boolean(true)),
            Err(HandlerError::InvalidValue { .. })
        ));
        facade.save().unwrap();

        let reopened = open(shared.committed().unwrap(), WriteOutput::boxed(Vec::new()));
        assert_eq!(
            reopened.read_metadata("created"),
            Some(MetadataValue::Timestamp(created))
        );
        assert_eq!(
            reopened.read_metadata("last_saved"),
            Some(MetadataValue::Timestamp(
                Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap()
            ))
        );
    }

    #[test]
    fn test_refuses_text_that_would_damage_string_vectors() {
        let mut doc_summary = PropertySet::new(FMTID_DOC_SUMMARY_INFORMATION);
        doc_summary.section_mut(FMTID_DOC_SUMMARY_INFORMATION).set(
            0x0D,
            PropertyValue::Other {
                vt: 0x101E,
                data: vec![5, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0x7F],
            },
        );
        let mut container = CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        container
            .create_stream(DOC_SUMMARY_STREAM)
            .unwrap()
            .write_all(&doc_summary.to_bytes().unwrap())
            .unwrap();
        container.flush().unwrap();

        let shared = SharedOutput::default();
        let mut facade = open(container.into_inner().into_inner(), shared.writer());

        assert!(matches!(
            facade.write_metadata("company", MetadataValue::Text("\u{141}\u{F3}d\u{17A} AB".to_string())),
            Err(HandlerError::InvalidValue { ref field, .. }) if field == "company"
        ));
        facade
            .write_metadata("company", MetadataValue::Text("Caf\u{E9} \u{20AC}".to_string()))
            .unwrap();
        facade.save().unwrap();

        let reopened = open(shared.committed().unwrap(), WriteOutput::boxed(Vec::new()));
        assert_eq!(
            reopened.read_metadata("company"),
            Some(MetadataValue::Text("Caf\u{E9} \u{20AC}".to_string()))
        );
    }

    #[test]
    fn test_rejects_blank_field_name() {
        let mut facade = open(sample_document(None), WriteOutput::boxed(Vec::new()));
        assert!(matches!(
            facade.write_metadata("  ", MetadataValue::Integer(1)),
            Err(HandlerError::InvalidField(_))
        ));
    }

    #[test]
    fn test_not_a_compound_file() {
        let result = OleContentFacade::open(
            Box::new(Cursor::new(b"plain text, not OLE".to_vec())),
            WriteOutput::boxed(Vec::new()),
        );
        assert!(matches!(result, Err(HandlerError::Corrupt(_))));
    }

    #[test]
    fn test_filetime_conversion() {
        let epoch = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(datetime_to_filetime(epoch), Some(116_444_736_000_000_000));
        assert_eq!(filetime_to_datetime(116_444_736_000_000_000), Some(epoch));
        assert_eq!(filetime_to_datetime(0), None);

        let ts = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(filetime_to_datetime(datetime_to_filetime(ts).unwrap()), Some(ts));
    }
}
