use std::path::PathBuf;

use docforge::{FailureKind, Generator, GeneratorConfig, HandlebarsEngine, TemplateEngine};
use serde_json::json;

fn shipped_templates() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../templates")
}

#[tokio::test]
async fn test_invoice_renders_to_pdf() {
    let generator = Generator::new(GeneratorConfig::new(shipped_templates()));

    let outcome = generator
        .generate("Invoice", json!({ "customerName": "John Doe", "amount": 100 }))
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert!(!outcome.pdf.is_empty());
    assert_eq!(&outcome.pdf[0..5], b"%PDF-");
    assert_eq!(generator.metrics().pdfs_generated(), 1);
}

#[tokio::test]
async fn test_invoice_with_line_items_renders_to_pdf() {
    let generator = Generator::new(GeneratorConfig::new(shipped_templates()));

    let outcome = generator
        .generate(
            "Invoice",
            json!({
                "invoice_number": "INV-2024-001",
                "customer_name": "John Doe",
                "amount": 150.0,
                "currency": "eur",
                "issuedAt": "2024-03-05T10:00:00Z",
                "items": [
                    { "description": "Consulting", "quantity": 2, "unitPrice": 50 },
                    { "description": "Support", "quantity": 1, "unitPrice": 50 }
                ]
            }),
        )
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_nested_template_renders_to_pdf() {
    let generator = Generator::new(GeneratorConfig::new(shipped_templates()));

    let outcome = generator
        .generate(
            "Letters/Welcome",
            r#"{"recipientName": "Ada", "companyName": "Docforge", "senderName": "Grace"}"#,
        )
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.model.as_deref(), Some("Letters::WelcomeInstance"));
    assert!(outcome.pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_unknown_template_produces_no_bytes() {
    let generator = Generator::new(GeneratorConfig::new(shipped_templates()));

    let outcome = generator.generate("DoesNotExist", json!({})).await;

    assert!(!outcome.success);
    assert!(outcome.pdf.is_empty());
    assert!(outcome.message.contains("does not exist"));
    assert_eq!(outcome.failure, Some(FailureKind::TemplateNotFound));
}

#[test]
fn test_shipped_invoice_template_renders_html() {
    let source = std::fs::read_to_string(shipped_templates().join("Invoice.hbs")).unwrap();
    let engine = HandlebarsEngine::new();

    let html = engine
        .render(
            "Invoice",
            &source,
            &json!({
                "invoiceNumber": "INV-7",
                "customerName": "John Doe",
                "amount": 100,
                "currency": "usd",
                "items": [{ "description": "Widget", "quantity": 4, "unitPrice": 2.5 }]
            }),
        )
        .unwrap();

    assert!(html.contains("Invoice INV-7"));
    assert!(html.contains("<b>John Doe</b>"));
    assert!(html.contains("Widget: 4 x 2.50 = 10.00"));
    assert!(html.contains("Total: 100.00 USD"));
}
