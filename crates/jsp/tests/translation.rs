use jsp::dom::parse_document;
use jsp::dom_snapshot::{DomSnapshot, DomSnapshotOptions};
use jsp::names::JSP_NAMESPACE;
use jsp::{
    FsResourceLoader, JspConfigManager, JspId, JspOptions, MemoryResourceLoader, NodeKind,
    Translation, TranslationError, Translator,
};

fn plain() -> JspOptions {
    JspOptions {
        use_implicit_tag_libs: false,
        ..JspOptions::default()
    }
}

fn translate(loader: &MemoryResourceLoader, entry: &str) -> jsp::Result<Translation> {
    Translator::new(loader).with_options(plain()).translate(entry)
}

/// Character data of every CDATA node, in document order.
fn cdata_texts(translation: &Translation) -> Vec<String> {
    let doc = &translation.document;
    doc.preorder()
        .into_iter()
        .filter_map(|id| match doc.kind(id) {
            NodeKind::CData { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn encoding_resolution_grid() {
    struct Case {
        name: &'static str,
        path: &'static str,
        bytes: Vec<u8>,
        encoding: &'static str,
        text: &'static str,
    }

    let mut utf8_bom = vec![0xEF, 0xBB, 0xBF];
    utf8_bom.extend_from_slice("caf\u{e9}".as_bytes());

    let mut utf16_bom = vec![0xFF, 0xFE];
    for unit in "h\u{e9}".encode_utf16() {
        utf16_bom.extend_from_slice(&unit.to_le_bytes());
    }

    let mut shift_jis = br#"<%@ page pageEncoding="Shift_JIS" %>"#.to_vec();
    shift_jis.extend_from_slice(&[0x93, 0xFA, 0x96, 0x7B]);

    let mut content_type = br#"<%@ page contentType="text/html; charset=UTF-8" %>"#.to_vec();
    content_type.extend_from_slice("\u{e9}t\u{e9}".as_bytes());

    let mut latin1 = b"caf".to_vec();
    latin1.push(0xE9);

    let mut prolog = br#"<?xml version="1.0" encoding="ISO-8859-1"?><p>"#.to_vec();
    prolog.push(0xE9);
    prolog.extend_from_slice(b"</p>");

    let cases = vec![
        Case {
            name: "utf-8 byte order mark",
            path: "/bom8.jsp",
            bytes: utf8_bom,
            encoding: "UTF-8",
            text: "caf\u{e9}",
        },
        Case {
            name: "utf-16le byte order mark",
            path: "/bom16.jsp",
            bytes: utf16_bom,
            encoding: "UTF-16LE",
            text: "h\u{e9}",
        },
        Case {
            name: "pageEncoding",
            path: "/sjis.jsp",
            bytes: shift_jis,
            encoding: "Shift_JIS",
            text: "\u{65e5}\u{672c}",
        },
        Case {
            name: "contentType charset",
            path: "/ct.jsp",
            bytes: content_type,
            encoding: "UTF-8",
            text: "\u{e9}t\u{e9}",
        },
        Case {
            name: "page default",
            path: "/plain.jsp",
            bytes: latin1,
            encoding: "ISO-8859-1",
            text: "caf\u{e9}",
        },
        Case {
            name: "xml prolog",
            path: "/prolog.jspx",
            bytes: prolog,
            encoding: "ISO-8859-1",
            text: "\u{e9}",
        },
    ];

    for case in cases {
        let loader = MemoryResourceLoader::new().with(case.path, case.bytes);
        let translation = translate(&loader, case.path)
            .unwrap_or_else(|err| panic!("{}: {err}", case.name));
        assert_eq!(translation.encoding.as_deref(), Some(case.encoding), "{}", case.name);
        assert_eq!(cdata_texts(&translation), vec![case.text.to_string()], "{}", case.name);
    }
}

#[test]
fn byte_order_mark_conflicting_with_page_encoding() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(br#"<%@ page pageEncoding="ISO-8859-1" %>x"#);
    let loader = MemoryResourceLoader::new().with("/a.jsp", bytes);
    let err = translate(&loader, "/a.jsp").expect_err("conflict");
    assert!(matches!(err, TranslationError::EncodingConflict { .. }), "{err}");
}

#[test]
fn jsp_root_in_a_page_switches_to_document_syntax() {
    let loader = MemoryResourceLoader::new().with(
        "/a.jsp",
        r#"<jsp:root xmlns:jsp="http://java.sun.com/JSP/Page" version="2.0"><jsp:text>t</jsp:text></jsp:root>"#,
    );
    let translation = translate(&loader, "/a.jsp").expect("translate");
    assert!(translation.is_xml);
    assert_eq!(cdata_texts(&translation), vec!["t".to_string()]);
}

#[test]
fn unsupported_encoding_is_reported() {
    let loader = MemoryResourceLoader::new()
        .with("/a.jsp", r#"<%@ page pageEncoding="x-no-such-charset" %>"#);
    let err = translate(&loader, "/a.jsp").expect_err("unknown encoding");
    assert!(matches!(err, TranslationError::UnsupportedEncoding { .. }), "{err}");
}

#[test]
fn include_cycles_are_detected() {
    let two = MemoryResourceLoader::new()
        .with("/a.jsp", r#"<%@ include file="b.jsp" %>"#)
        .with("/b.jsp", r#"<%@ include file="a.jsp" %>"#);
    let err = translate(&two, "/a.jsp").expect_err("a -> b -> a");
    assert!(
        matches!(
            &err,
            TranslationError::CircularDependency { path, physical }
                if path == "/a.jsp" && physical == "memory:/a.jsp"
        ),
        "{err}"
    );
    assert!(err.to_string().contains("memory:/a.jsp"), "{err}");

    let three = MemoryResourceLoader::new()
        .with("/a.jsp", r#"<%@ include file="/b/b.jsp" %>"#)
        .with("/b/b.jsp", r#"<jsp:directive.include file="../c.jsp"/>"#)
        .with("/c.jsp", r#"<%@ include file="a.jsp" %>"#);
    let err = translate(&three, "/a.jsp").expect_err("a -> b -> c -> a");
    assert!(
        matches!(
            &err,
            TranslationError::CircularDependency { path, physical }
                if path == "/a.jsp" && physical == "memory:/a.jsp"
        ),
        "{err}"
    );

    let own = MemoryResourceLoader::new().with("/a.jsp", r#"x<%@ include file="a.jsp" %>"#);
    let err = translate(&own, "/a.jsp").expect_err("self include");
    assert!(matches!(err, TranslationError::CircularDependency { .. }), "{err}");
}

#[test]
fn repeated_include_is_not_a_cycle() {
    let loader = MemoryResourceLoader::new()
        .with(
            "/a.jsp",
            r#"<%@ include file="b.jspf" %>,<%@ include file="b.jspf" %>"#,
        )
        .with("/b.jspf", "b");
    let translation = translate(&loader, "/a.jsp").expect("translate");
    assert_eq!(translation.dependencies, vec!["/b.jspf".to_string(), "/b.jspf".to_string()]);
    assert_eq!(cdata_texts(&translation), vec!["b", ",", "b"]);
}

#[test]
fn prefix_redefined_across_includes() {
    let loader = MemoryResourceLoader::new()
        .with(
            "/a.jsp",
            "<%@ include file=\"one.jspf\" %>\n<%@ include file=\"two.jspf\" %>",
        )
        .with("/one.jspf", r#"<%@ taglib prefix="c" uri="http://one" %>"#)
        .with("/two.jspf", r#"<%@ taglib prefix="c" uri="http://two" %>"#);

    let err = translate(&loader, "/a.jsp").expect_err("redefinition");
    match &err {
        TranslationError::Include { path, line, column, .. } => {
            assert_eq!((path.as_str(), *line, *column), ("/a.jsp", 2, 1));
        }
        other => panic!("expected include context, got {other}"),
    }
    let cause = err.root_cause().to_string();
    assert!(cause.contains("http://one") && cause.contains("http://two"), "{cause}");

    let lenient = JspOptions {
        allow_taglib_prefix_redefinition: true,
        ..plain()
    };
    Translator::new(&loader)
        .with_options(lenient)
        .translate("/a.jsp")
        .expect("redefinition allowed");
}

#[test]
fn translation_is_deterministic() {
    let loader = MemoryResourceLoader::new()
        .with(
            "/a.jsp",
            "<%@ taglib prefix=\"c\" uri=\"core\" %>\n<c:if test=\"x\">\n<%= a %>text<!-- c -->\n</c:if>\n",
        )
        .with(
            "/b.jspx",
            r#"<jsp:root xmlns:jsp="http://java.sun.com/JSP/Page" version="2.0"><p>a<![CDATA[b]]></p></jsp:root>"#,
        );
    let translator = Translator::new(&loader).with_options(plain());
    for entry in ["/a.jsp", "/b.jspx"] {
        let first = translator.translate(entry).expect("first");
        let second = translator.translate(entry).expect("second");
        assert_eq!(first.document.to_xml_string(), second.document.to_xml_string(), "{entry}");
        assert_eq!(first.cdata_ids, second.cdata_ids, "{entry}");
        assert_eq!(first.dependencies, second.dependencies, "{entry}");
    }
}

#[test]
fn every_jsp_id_round_trips() {
    let loader = MemoryResourceLoader::new()
        .with(
            "/dir/my page.jsp",
            "<%@ page import=\"a.*\" %>\n<jsp:useBean id=\"b\"\n class=\"B\">\n<% x(); %>\n</jsp:useBean>\n<%@ include file=\"inc.jspf\" %>",
        )
        .with("/dir/inc.jspf", "<%! int n; %>tail");
    let translation = translate(&loader, "/dir/my page.jsp").expect("translate");
    let doc = &translation.document;

    let mut seen = 0;
    for id in doc.preorder() {
        let Some(element) = doc.element(id) else {
            continue;
        };
        let value = element
            .attribute_ns(JSP_NAMESPACE, "id")
            .unwrap_or_else(|| panic!("{} has no jsp:id", element.name));
        let parsed = JspId::parse(value).unwrap_or_else(|| panic!("malformed jsp:id {value}"));
        assert_eq!(parsed.to_string(), value);
        assert!(parsed.path.starts_with("/dir/"), "{value}");
        seen += 1;
    }
    assert_eq!(seen, 5);

    for value in translation.cdata_ids.values() {
        let parsed = JspId::parse(value).unwrap_or_else(|| panic!("malformed jsp:id {value}"));
        assert_eq!(parsed.to_string(), *value);
    }
    assert!(
        translation
            .cdata_ids
            .values()
            .any(|value| value.starts_with("%2Fdir%2Finc.jspf[1,14,1]")),
        "{:?}",
        translation.cdata_ids
    );
}

#[test]
fn supplied_documents_are_converted() {
    let document = parse_document(
        "/gen.jspx",
        r#"<jsp:root xmlns:jsp="http://java.sun.com/JSP/Page" version="2.0"><jsp:directive.include file="part.jspf"/><p>x</p></jsp:root>"#,
    )
    .expect("parse");
    let loader = MemoryResourceLoader::new().with("/part.jspf", "part");
    let translation = Translator::new(&loader)
        .with_options(plain())
        .translate_document("/gen.jspx", document)
        .expect("convert");
    assert!(translation.is_xml);
    assert_eq!(translation.dependencies, vec!["/part.jspf".to_string()]);
    assert_eq!(cdata_texts(&translation), vec!["part".to_string(), "x".to_string()]);
}

#[test]
fn converted_documents_match_parsed_documents() {
    let source = concat!(
        "<x:root xmlns:x=\"http://java.sun.com/JSP/Page\" xmlns:c=\"urn:c\"\n",
        "    version=\"2.0\">\n",
        "  <x:text>  </x:text>\n",
        "  <p class=\"x\"\n",
        "     id=\"y\">a &amp; b<!-- note --><![CDATA[ <c> ]]></p>\n",
        "  <c:out value=\"1\"/>\n",
        "  <x:directive.include file=\"part.jspf\"/>\n",
        "</x:root>\n",
    );
    let loader = MemoryResourceLoader::new()
        .with("/p.jspx", source)
        .with("/part.jspf", "part");
    let parsed = translate(&loader, "/p.jspx").expect("parse");
    let converted = Translator::new(&loader)
        .with_options(plain())
        .translate_document("/p.jspx", parse_document("/p.jspx", source).expect("load"))
        .expect("convert");

    let snapshot = |t: &Translation| {
        DomSnapshot::new(&t.document, Some(&t.cdata_ids), DomSnapshotOptions::default())
            .as_lines()
            .to_vec()
    };
    assert_eq!(snapshot(&converted), snapshot(&parsed));
    assert_eq!(converted.document.to_xml_string(), parsed.document.to_xml_string());
    assert_eq!(converted.dependencies, parsed.dependencies);
    assert_eq!(converted.cdata_ids, parsed.cdata_ids);

    let root = parsed.document.document_element().expect("root");
    let root_el = parsed.document.element(root).expect("root element");
    assert_eq!(root_el.attribute("x:id"), Some("%2Fp.jspx[1,1,2][8,1]"));
}

#[test]
fn preludes_apply_only_to_the_top_level_resource() {
    let manager = JspConfigManager::from_toml_str(
        r#"
        [[propertyGroups]]
        urlPatterns = ["/*"]
        includePreludes = ["/pre.jspf"]
        "#,
    )
    .expect("config");
    let loader = MemoryResourceLoader::new()
        .with("/a.jsp", r#"<%@ include file="b.jspf" %>"#)
        .with("/b.jspf", "b")
        .with("/pre.jspf", "pre");
    let translation = Translator::new(&loader)
        .with_options(plain())
        .with_config_manager(manager)
        .translate("/a.jsp")
        .expect("translate");
    assert_eq!(cdata_texts(&translation), vec!["pre".to_string(), "b".to_string()]);
}

#[test]
fn filesystem_loader_reads_under_its_root() {
    let root = std::env::temp_dir().join(format!("jsp-translation-{}", std::process::id()));
    std::fs::create_dir_all(root.join("inc")).expect("mkdir");
    std::fs::write(root.join("index.jsp"), r#"<%@ include file="inc/part.jspf" %>!"#).expect("write");
    std::fs::write(root.join("inc/part.jspf"), "part").expect("write");

    let loader = FsResourceLoader::new(&root);
    let translation = Translator::new(&loader)
        .with_options(plain())
        .translate("index.jsp")
        .expect("translate");
    assert_eq!(cdata_texts(&translation), vec!["part".to_string(), "!".to_string()]);

    let err = Translator::new(&loader).translate("/missing.jsp").expect_err("missing");
    assert!(matches!(err, TranslationError::ResourceNotFound { .. }), "{err}");
    let _ = std::fs::remove_dir_all(&root);
}
