//! PDF extraction against documents built in memory.

mod common;

use std::path::PathBuf;

use common::pdf_with_pages;
use pdfqa_rag::{ErrorKind, ExtractionPolicy, PdfExtractor, PdfSource, RagError};

#[tokio::test]
async fn extracts_page_text() {
    let source = PdfSource::bytes("hello.pdf", pdf_with_pages(&["Hello World"]));
    let document = PdfExtractor::new().extract(&source).await.unwrap();

    assert_eq!(document.source, "hello.pdf");
    assert_eq!(document.pages.len(), 1);
    assert_eq!(document.pages[0].number, 1);
    assert!(document.pages[0].text.contains("Hello"));
}

#[tokio::test]
async fn pages_come_back_in_page_order() {
    let pdf = pdf_with_pages(&["Chapter one", "Chapter two", "Chapter three"]);
    let source = PdfSource::bytes("book.pdf", pdf);
    let document = PdfExtractor::new().extract(&source).await.unwrap();

    let numbers: Vec<u32> = document.pages.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let text = document.text();
    let one = text.find("one").unwrap();
    let two = text.find("two").unwrap();
    let three = text.find("three").unwrap();
    assert!(one < two && two < three);
}

#[tokio::test]
async fn invalid_bytes_are_an_extraction_error() {
    let source = PdfSource::bytes("notes.txt", b"just some text".to_vec());
    let err = PdfExtractor::new().extract(&source).await.unwrap_err();
    match err {
        RagError::ExtractionError { source_name, .. } => assert_eq!(source_name, "notes.txt"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_file_is_an_extraction_error() {
    let source = PdfSource::from(PathBuf::from("/definitely/not/here.pdf"));
    let err = PdfExtractor::new().extract(&source).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Extraction);
}

#[tokio::test]
async fn reads_pdfs_from_disk() {
    let path = std::env::temp_dir().join(format!("pdfqa-extract-{}.pdf", std::process::id()));
    tokio::fs::write(&path, pdf_with_pages(&["Stored on disk"])).await.unwrap();

    let document = PdfExtractor::new().extract(&PdfSource::from(path.as_path())).await;
    tokio::fs::remove_file(&path).await.unwrap();

    let document = document.unwrap();
    assert_eq!(document.source, path.display().to_string());
    assert!(document.text().contains("disk"));
}

#[tokio::test]
async fn concatenates_sources_in_input_order() {
    let sources = vec![
        PdfSource::bytes("a.pdf", pdf_with_pages(&["Alpha"])),
        PdfSource::bytes("b.pdf", pdf_with_pages(&["Bravo"])),
    ];
    let text = PdfExtractor::new().extract_text(&sources).await.unwrap();
    assert!(text.find("Alpha").unwrap() < text.find("Bravo").unwrap());
}

#[tokio::test]
async fn policy_decides_what_happens_to_bad_sources() {
    let sources = vec![
        PdfSource::bytes("good.pdf", pdf_with_pages(&["Fine"])),
        PdfSource::bytes("bad.pdf", b"garbage".to_vec()),
    ];

    assert!(PdfExtractor::new().extract_all(&sources).await.is_err());

    let lenient = PdfExtractor::new().with_policy(ExtractionPolicy::SkipInvalid);
    let documents = lenient.extract_all(&sources).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].source, "good.pdf");
}
