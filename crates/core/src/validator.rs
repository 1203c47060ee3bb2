const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// True iff the content starts with the PDF magic number.
pub fn is_pdf(content: &[u8]) -> bool {
    content.starts_with(PDF_MAGIC)
}
