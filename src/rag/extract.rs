use std::io::Read;

use crate::core::errors::ApiError;

/// Extract plain text from an uploaded file, dispatching on the filename
/// suffix. Unknown formats are treated as UTF-8 text (lossy), which never
/// fails; PDF and DOCX parsing can.
pub async fn extract_text(bytes: Vec<u8>, filename: &str) -> Result<String, ApiError> {
    let lower = filename.to_ascii_lowercase();

    if lower.ends_with(".pdf") {
        extract_pdf(bytes, filename).await
    } else if lower.ends_with(".docx") {
        extract_docx(&bytes, filename)
    } else {
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// pdf parsing is CPU-bound, so it runs off the async runtime.
async fn extract_pdf(bytes: Vec<u8>, filename: &str) -> Result<String, ApiError> {
    let name = filename.to_string();
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|err| extraction_error(&name, err))
    })
    .await
    .map_err(ApiError::internal)?
}

/// A .docx file is a zip archive; the document body lives in
/// `word/document.xml`.
fn extract_docx(bytes: &[u8], filename: &str) -> Result<String, ApiError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|err| extraction_error(filename, err))?;

    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|err| extraction_error(filename, err))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|err| extraction_error(filename, err))?;

    Ok(plaintext_from_document_xml(&xml))
}

fn extraction_error<E: std::fmt::Display>(filename: &str, err: E) -> ApiError {
    ApiError::Extraction {
        filename: filename.to_string(),
        reason: err.to_string(),
    }
}

/// Collect the `<w:t>` run text out of WordprocessingML, turning paragraph
/// ends into newlines. A full XML parser is overkill for this one element.
fn plaintext_from_document_xml(xml: &str) -> String {
    let mut out = String::new();
    let mut cursor = xml;

    loop {
        let next_run = find_text_run(cursor);
        let next_para = cursor.find("</w:p>");

        match (next_run, next_para) {
            (Some(run), para) if para.map_or(true, |p| run < p) => {
                let after = &cursor[run + 4..];
                let Some(gt) = after.find('>') else { break };
                if after[..gt].ends_with('/') {
                    cursor = &after[gt + 1..];
                    continue;
                }
                let body = &after[gt + 1..];
                let Some(close) = body.find("</w:t>") else { break };
                out.push_str(&decode_xml_entities(&body[..close]));
                cursor = &body[close + "</w:t>".len()..];
            }
            (_, Some(para)) => {
                out.push('\n');
                cursor = &cursor[para + "</w:p>".len()..];
            }
            _ => break,
        }
    }

    out.trim().to_string()
}

/// Find the next `<w:t>` or `<w:t ...>` open tag, skipping other `w:t*`
/// elements such as `<w:tbl>` and `<w:tab/>`.
fn find_text_run(xml: &str) -> Option<usize> {
    let mut offset = 0;
    loop {
        let pos = xml[offset..].find("<w:t")?;
        let absolute = offset + pos;
        match xml[absolute + 4..].chars().next() {
            Some('>') | Some(' ') | Some('/') => return Some(absolute),
            Some(_) => offset = absolute + 4,
            None => return None,
        }
    }
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let cursor = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(cursor);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn plain_text_passes_through_verbatim() {
        let text = extract_text(b"tomato blight notes".to_vec(), "notes.txt")
            .await
            .unwrap();
        assert_eq!(text, "tomato blight notes");
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily_instead_of_failing() {
        let text = extract_text(vec![0x66, 0x6f, 0xff, 0x6f], "weird.bin")
            .await
            .unwrap();
        assert!(text.contains('\u{FFFD}'));
        assert!(text.starts_with("fo"));
    }

    #[tokio::test]
    async fn broken_pdf_reports_the_filename() {
        let err = extract_text(b"definitely not a pdf".to_vec(), "Report.PDF")
            .await
            .unwrap_err();
        match err {
            ApiError::Extraction { filename, .. } => assert_eq!(filename, "Report.PDF"),
            other => panic!("expected Extraction, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn docx_text_runs_and_paragraphs_are_extracted() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Crop rotation </w:t></w:r><w:r><w:t xml:space="preserve">basics</w:t></w:r></w:p>
    <w:p><w:r><w:t>Spacing &amp; airflow</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

        let text = extract_text(docx_bytes(xml), "guide.docx").await.unwrap();
        assert_eq!(text, "Crop rotation basics\nSpacing & airflow");
    }

    #[tokio::test]
    async fn docx_tables_do_not_leak_tag_noise() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell one</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:tab/><w:t>after table</w:t></w:r></w:p>
</w:body></w:document>"#;

        let text = extract_text(docx_bytes(xml), "table.docx").await.unwrap();
        assert_eq!(text, "cell one\nafter table");
    }

    #[tokio::test]
    async fn docx_without_document_xml_is_an_extraction_error() {
        let cursor = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(cursor);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("unrelated.txt", options).unwrap();
        writer.write_all(b"nope").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_text(bytes, "empty.docx").await.unwrap_err();
        assert!(matches!(err, ApiError::Extraction { .. }));
    }

    #[test]
    fn entity_decoding_handles_the_named_set() {
        assert_eq!(
            decode_xml_entities("a &lt;tag&gt; &quot;q&quot; &apos;s&apos; &amp; done"),
            "a <tag> \"q\" 's' & done"
        );
    }
}
