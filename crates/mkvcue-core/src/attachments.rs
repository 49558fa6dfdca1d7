//! Attached files.

use crate::ebml::{ByteSpan, Element};
use crate::error::{Error, Result};
use crate::schema::ids;
use bytes::Bytes;
use std::io::{Read, Seek};

/// One AttachedFile; its data stays in the file until read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub name: String,
    pub description: Option<String>,
    pub mime_type: String,
    pub uid: Option<u64>,
    pub data: ByteSpan,
}

impl FileAttachment {
    /// Reads the fields of a parsed AttachedFile element
    pub fn from_element(el: &Element) -> Result<Self> {
        let data = el
            .span(ids::FILE_DATA)
            .ok_or_else(|| Error::missing("FileData"))?;
        Ok(Self {
            name: el.string(ids::FILE_NAME).unwrap_or_default().to_owned(),
            description: el.string(ids::FILE_DESCRIPTION).map(str::to_owned),
            mime_type: el.string(ids::FILE_MIME_TYPE).unwrap_or_default().to_owned(),
            uid: el.uint(ids::FILE_UID),
            data,
        })
    }

    /// Size of the attached data in bytes
    pub fn size(&self) -> u64 {
        self.data.length
    }

    /// Reads the attached data, restoring the cursor afterwards
    pub fn read<R: Read + Seek>(&self, reader: &mut R) -> Result<Bytes> {
        self.data.read(reader)
    }
}

/// Parses every AttachedFile of an Attachments element, in file order
pub fn read_attachments(attachments: &Element) -> Result<Vec<FileAttachment>> {
    attachments
        .children_with_id(ids::ATTACHED_FILE)
        .map(FileAttachment::from_element)
        .collect()
}
