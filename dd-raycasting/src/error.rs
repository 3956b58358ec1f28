use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CAD import error: {0}")]
    CadImport(#[from] cad_import::Error),

    #[error("File has either no extension or an invalid extension")]
    InvalidFileExtension,

    #[error("No loader found for the given file")]
    NoLoaderFound,

    #[error("Serialization error: {0}")]
    SerializationError(Box<dyn std::error::Error + Send + Sync>),

    #[error("Deserialization error: {0}")]
    DeserializationError(Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("A geometry with id {0} is already attached")]
    DuplicateGeometryId(u32),

    #[error("No geometry with id {0} is attached")]
    UnknownGeometryId(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
