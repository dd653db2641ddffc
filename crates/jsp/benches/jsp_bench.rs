use criterion::{Criterion, black_box, criterion_group, criterion_main};
use jsp::{JspOptions, MemoryResourceLoader, Translator};

const SMALL_BLOCKS: usize = 64;
const LARGE_BLOCKS: usize = 5_000;

fn make_page(blocks: usize) -> String {
    let mut page = String::from(
        "<%@ page pageEncoding=\"UTF-8\" %>\n<%@ taglib prefix=\"c\" uri=\"http://java.sun.com/jsp/jstl/core\" %>\n",
    );
    for i in 0..blocks {
        page.push_str("<div class=\"row\">\n  <c:if test=\"${row.visible}\">\n");
        page.push_str("    <span><%= row.get(");
        page.push_str(&i.to_string());
        page.push_str(") %></span>\n  </c:if>\n  <!-- row -->\n</div>\n");
    }
    page
}

fn make_document(blocks: usize) -> String {
    let mut doc = String::from(
        "<jsp:root xmlns:jsp=\"http://java.sun.com/JSP/Page\" xmlns:c=\"http://java.sun.com/jsp/jstl/core\" version=\"2.0\">\n",
    );
    for i in 0..blocks {
        doc.push_str("<div class=\"row\"><c:if test=\"${row.visible}\"><span><jsp:expression>row.get(");
        doc.push_str(&i.to_string());
        doc.push_str(")</jsp:expression></span></c:if><![CDATA[ & ]]></div>\n");
    }
    doc.push_str("</jsp:root>\n");
    doc
}

fn options() -> JspOptions {
    JspOptions {
        use_implicit_tag_libs: false,
        ..JspOptions::default()
    }
}

fn bench_page_small(c: &mut Criterion) {
    let loader = MemoryResourceLoader::new().with("/bench.jsp", make_page(SMALL_BLOCKS));
    let translator = Translator::new(&loader).with_options(options());
    c.bench_function("bench_page_small", |b| {
        b.iter(|| {
            let translation = translator.translate(black_box("/bench.jsp"));
            black_box(translation.is_ok());
        });
    });
}

fn bench_page_large(c: &mut Criterion) {
    let loader = MemoryResourceLoader::new().with("/bench.jsp", make_page(LARGE_BLOCKS));
    let translator = Translator::new(&loader).with_options(options());
    c.bench_function("bench_page_large", |b| {
        b.iter(|| {
            let translation = translator.translate(black_box("/bench.jsp"));
            black_box(translation.is_ok());
        });
    });
}

fn bench_document_large(c: &mut Criterion) {
    let loader = MemoryResourceLoader::new().with("/bench.jspx", make_document(LARGE_BLOCKS));
    let translator = Translator::new(&loader).with_options(options());
    c.bench_function("bench_document_large", |b| {
        b.iter(|| {
            let translation = translator.translate(black_box("/bench.jspx"));
            black_box(translation.is_ok());
        });
    });
}

fn bench_nested_includes(c: &mut Criterion) {
    let mut loader = MemoryResourceLoader::new();
    let depth = 32;
    for level in 0..depth {
        let body = if level + 1 == depth {
            make_page(SMALL_BLOCKS)
        } else {
            format!("<%@ include file=\"/inc{}.jspf\" %>level {level}\n", level + 1)
        };
        loader.insert(&format!("/inc{level}.jspf"), body);
    }
    loader.insert("/bench.jsp", "<%@ include file=\"/inc0.jspf\" %>");
    let translator = Translator::new(&loader).with_options(options());
    c.bench_function("bench_nested_includes", |b| {
        b.iter(|| {
            let translation = translator.translate(black_box("/bench.jsp"));
            black_box(translation.is_ok());
        });
    });
}

criterion_group!(
    benches,
    bench_page_small,
    bench_page_large,
    bench_document_large,
    bench_nested_includes
);
criterion_main!(benches);
