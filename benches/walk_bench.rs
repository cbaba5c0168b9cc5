use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pagecut::static_dom::StaticDom;
use pagecut::{walk, ExclusionSet};

fn feed_page(items: usize) -> String {
    let mut html = String::from("<html><body><main id=feed>");
    for i in 0..items {
        if i % 5 == 0 {
            html.push_str(r#"<div class="ad">sponsored</div>"#);
        }
        if i % 20 == 0 {
            html.push_str(r#"<x-card><template shadowrootmode="open"><span class="ad">s</span><p>card</p></template></x-card>"#);
        }
        html.push_str(&format!("<article id=item-{}><h2>Item {}</h2><p>Body</p></article>", i, i));
    }
    html.push_str(r#"<iframe srcdoc="<div class='ad'>framed</div><p>inner</p>"></iframe>"#);
    html.push_str("</main></body></html>");
    html
}

fn bench_parse_patterns(c: &mut Criterion) {
    c.bench_function("parse_exclusion_set", |b| {
        b.iter(|| ExclusionSet::parse(black_box(".ad, #cookie-banner, div:not(.keep, .pin), a[title=\"x, y\"]")))
    });
}

fn bench_walk(c: &mut Criterion) {
    let html = feed_page(200);
    let set = ExclusionSet::parse(".ad, #cookie-banner");

    c.bench_function("walk_static_feed_200", |b| {
        b.iter_batched(
            || StaticDom::parse(&html),
            |mut dom| walk(&mut dom, &set).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_parse_patterns, bench_walk);
criterion_main!(benches);
