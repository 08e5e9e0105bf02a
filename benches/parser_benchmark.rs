//! Parser throughput on a saved product page
//!
//! Compares compiling selectors per call against reusing one parser.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use review_crawler_lib::infrastructure::config::SelectorConfig;
use review_crawler_lib::infrastructure::{PageContext, ProductPageParser};

const FIXTURE: &str = include_str!("../tests/fixtures/product_page.html");
const URL: &str = "https://www.newegg.com/amd-ryzen-7-9800x3d/p/N82E16819113877";

fn benchmark_parse_page(c: &mut Criterion) {
    let selectors = SelectorConfig::default();
    let parser = ProductPageParser::new(&selectors).unwrap();
    let ctx = PageContext::new(URL);

    c.bench_function("parse_page_reused_parser", |b| {
        b.iter(|| parser.parse_page(black_box(FIXTURE), &ctx).unwrap())
    });

    c.bench_function("parse_page_fresh_parser", |b| {
        b.iter(|| {
            let parser = ProductPageParser::new(black_box(&selectors)).unwrap();
            parser.parse_page(black_box(FIXTURE), &ctx).unwrap()
        })
    });

    c.bench_function("parse_reviews_only", |b| {
        b.iter(|| parser.parse_reviews(black_box(FIXTURE)))
    });
}

criterion_group!(benches, benchmark_parse_page);
criterion_main!(benches);
