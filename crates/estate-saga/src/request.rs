use bytes::Bytes;
use estate_types::FieldMap;

/// A file that has already passed the admission gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmittedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl AdmittedFile {
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// One inbound create or update.
#[derive(Clone, Debug, Default)]
pub struct WriteRequest {
    /// Non-file fields as sent by the client.
    pub body: FieldMap,
    pub files: Vec<AdmittedFile>,
    /// Verified identity of the caller, if any.
    pub actor: Option<String>,
}

impl WriteRequest {
    pub fn new(body: FieldMap) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, file: AdmittedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Files admitted for `field`, in arrival order.
    pub fn files_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a AdmittedFile> + 'a {
        self.files.iter().filter(move |f| f.field == field)
    }
}
