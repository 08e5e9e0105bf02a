//! Parser behaviour against a saved product page
use chrono::NaiveDate;
use review_crawler_lib::domain::Availability;
use review_crawler_lib::infrastructure::config::SelectorConfig;
use review_crawler_lib::infrastructure::{PageContext, ParseError, ProductPageParser};

const FIXTURE: &str = include_str!("fixtures/product_page.html");
const URL: &str = "https://www.newegg.com/amd-ryzen-7-9000-series-ryzen-7-9800x3d/p/N82E16819113877";

fn parser() -> ProductPageParser {
    ProductPageParser::new(&SelectorConfig::default()).expect("default selectors compile")
}

#[test]
fn extracts_all_product_fields_from_fixture() {
    let product = parser().parse_product(FIXTURE, &PageContext::new(URL)).unwrap();

    assert_eq!(product.product_key, "N82E16819113877");
    assert!(product.title.contains("AMD Ryzen 7 9800X"));
    assert_eq!(product.brand.as_deref(), Some("AMD"));
    assert_eq!(product.price, Some(479.0));
    assert_eq!(product.price_text.as_deref(), Some("$479.00"));
    assert_eq!(product.currency.as_deref(), Some("USD"));
    assert_eq!(product.rating, Some(4.8));
    assert_eq!(product.rating_count, Some(484));
    assert_eq!(product.availability, Availability::InStock);
    assert!(product.description.unwrap().contains("CES 2025 Innovation"));
}

#[test]
fn extracts_reviews_from_fixture() {
    let reviews = parser().parse_reviews(FIXTURE);
    assert_eq!(reviews.len(), 3);

    assert_eq!(reviews[0].reviewer_name.as_deref(), Some("Jane D."));
    assert_eq!(reviews[0].rating, Some(5));
    assert_eq!(reviews[0].title.as_deref(), Some("Best gaming CPU"));
    assert_eq!(reviews[0].review_date, NaiveDate::from_ymd_opt(2024, 10, 12));
    assert_eq!(reviews[0].date_raw.as_deref(), Some("10/12/2024 7:45:02 AM"));
    assert_eq!(reviews[0].helpful_votes, Some(12));
    assert!(reviews[0].verified_buyer);

    assert_eq!(reviews[1].rating, Some(4));
    assert!(!reviews[1].verified_buyer);
    assert_eq!(reviews[1].helpful_votes, None);

    assert_eq!(reviews[2].title, None);
    assert_eq!(reviews[2].rating, Some(1));

    // Distinct reviews get distinct keys
    assert_ne!(reviews[0].review_key, reviews[1].review_key);
}

#[test]
fn same_markup_yields_same_review_keys() {
    let first = parser().parse_reviews(FIXTURE);
    let reformatted = FIXTURE.replace("Pros: Fast,", "Pros:   Fast,");
    let second = parser().parse_reviews(&reformatted);
    assert_eq!(first[0].review_key, second[0].review_key);
}

#[test]
fn empty_document_is_rejected() {
    let err = parser().parse_product("   \n ", &PageContext::new(URL)).unwrap_err();
    assert_eq!(err, ParseError::EmptyDocument);
    assert!(parser().parse_page("", &PageContext::new(URL)).is_err());
}

#[test]
fn page_without_title_is_not_a_product_page() {
    let without_title = FIXTURE.replace("product-title", "headline");
    let err = parser()
        .parse_product(&without_title, &PageContext::new(URL))
        .unwrap_err();
    assert!(matches!(err, ParseError::UnrecognizedPage { .. }));
}

#[test]
fn malformed_markup_is_not_a_product_page() {
    let err = parser()
        .parse_product("<div><<p>>> not html at all", &PageContext::new(URL))
        .unwrap_err();
    assert!(matches!(err, ParseError::UnrecognizedPage { .. }));
}

#[test]
fn missing_optional_fields_become_none() {
    let html = r#"<html><body><h1 class="product-title">Bare Widget</h1></body></html>"#;
    let product = parser()
        .parse_product(html, &PageContext::new("https://shop.example.com/widgets/bare?ref=x"))
        .unwrap();

    assert_eq!(product.title, "Bare Widget");
    assert_eq!(product.product_key, "https://shop.example.com/widgets/bare");
    assert_eq!(product.brand, None);
    assert_eq!(product.price, None);
    assert_eq!(product.currency, None);
    assert_eq!(product.rating, None);
    assert_eq!(product.rating_count, None);
    assert_eq!(product.description, None);
    assert_eq!(product.availability, Availability::Unknown);
    assert!(parser().parse_reviews(html).is_empty());
}

#[test]
fn fallback_selectors_are_tried_in_order() {
    let html = r#"<html><body>
        <h1 itemprop="name">Schema Widget</h1>
        <span itemprop="price">19.99</span>
        <span itemprop="ratingValue">4.1</span>
    </body></html>"#;
    let product = parser().parse_product(html, &PageContext::new(URL)).unwrap();
    assert_eq!(product.title, "Schema Widget");
    assert_eq!(product.price, Some(19.99));
    assert_eq!(product.currency, None);
    assert_eq!(product.rating, Some(4.1));
}
