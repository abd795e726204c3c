pub mod document_chunk;
pub mod fact;
pub mod stored_document;
