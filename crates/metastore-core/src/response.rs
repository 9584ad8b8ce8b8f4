//! Response types for the five data object operations

use serde_json::{Map, Value};

use crate::error::Result;
use crate::parser::{GetResult, ResponseParser, SearchResult, WriteResult};

/// Result of a put
#[derive(Debug, Clone)]
pub struct PutDataObjectResponse {
    id: String,
    created: bool,
    parser: Option<ResponseParser>,
}

impl PutDataObjectResponse {
    pub fn new(id: impl Into<String>, created: bool, parser: Option<ResponseParser>) -> Self {
        Self {
            id: id.into(),
            created,
            parser,
        }
    }

    /// Id of the stored document (generated when the request had none)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created(&self) -> bool {
        self.created
    }

    pub fn parser(&self) -> Option<&ResponseParser> {
        self.parser.as_ref()
    }

    /// Parse the acknowledgement, if the backend returned one
    pub fn write_result(&self) -> Result<Option<WriteResult>> {
        self.parser.as_ref().map(ResponseParser::parse).transpose()
    }
}

/// Result of a get. Absence is a normal response with `found() == false`.
#[derive(Debug, Clone)]
pub struct GetDataObjectResponse {
    id: String,
    found: bool,
    parser: Option<ResponseParser>,
    source: Map<String, Value>,
}

impl GetDataObjectResponse {
    pub fn new(
        id: impl Into<String>,
        found: bool,
        parser: Option<ResponseParser>,
        source: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            found,
            parser,
            source,
        }
    }

    /// An empty, non-exceptional response for a missing document
    pub fn not_found(id: impl Into<String>, parser: Option<ResponseParser>) -> Self {
        Self::new(id, false, parser, Map::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn found(&self) -> bool {
        self.found
    }

    pub fn parser(&self) -> Option<&ResponseParser> {
        self.parser.as_ref()
    }

    /// The raw source map (empty when not found)
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    pub fn into_source(self) -> Map<String, Value> {
        self.source
    }

    /// Parse the full lookup result
    pub fn get_result(&self) -> Result<Option<GetResult>> {
        self.parser.as_ref().map(ResponseParser::parse).transpose()
    }
}

/// Result of an update
#[derive(Debug, Clone)]
pub struct UpdateDataObjectResponse {
    id: String,
    updated: bool,
    parser: Option<ResponseParser>,
}

impl UpdateDataObjectResponse {
    pub fn new(id: impl Into<String>, updated: bool, parser: Option<ResponseParser>) -> Self {
        Self {
            id: id.into(),
            updated,
            parser,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// False when the merge changed nothing
    pub fn updated(&self) -> bool {
        self.updated
    }

    pub fn parser(&self) -> Option<&ResponseParser> {
        self.parser.as_ref()
    }

    pub fn write_result(&self) -> Result<Option<WriteResult>> {
        self.parser.as_ref().map(ResponseParser::parse).transpose()
    }
}

/// Result of a delete
#[derive(Debug, Clone)]
pub struct DeleteDataObjectResponse {
    id: String,
    deleted: bool,
    parser: Option<ResponseParser>,
}

impl DeleteDataObjectResponse {
    pub fn new(id: impl Into<String>, deleted: bool, parser: Option<ResponseParser>) -> Self {
        Self {
            id: id.into(),
            deleted,
            parser,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn parser(&self) -> Option<&ResponseParser> {
        self.parser.as_ref()
    }

    pub fn write_result(&self) -> Result<Option<WriteResult>> {
        self.parser.as_ref().map(ResponseParser::parse).transpose()
    }
}

/// Result of a search
#[derive(Debug, Clone)]
pub struct SearchDataObjectResponse {
    parser: ResponseParser,
}

impl SearchDataObjectResponse {
    pub fn new(parser: ResponseParser) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> &ResponseParser {
        &self.parser
    }

    /// Parse the hits
    pub fn search_result(&self) -> Result<SearchResult> {
        self.parser.parse()
    }
}
