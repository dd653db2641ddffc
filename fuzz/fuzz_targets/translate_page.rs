#![no_main]

use jsp::{JspOptions, MemoryResourceLoader, Translator};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The first byte picks the lenient options so both code paths get input.
    let Some((&flags, body)) = data.split_first() else {
        return;
    };
    let options = JspOptions {
        allow_unmatched_end_tag: flags & 1 != 0,
        allow_multiple_attribute_values: flags & 2 != 0,
        allow_taglib_prefix_use_before_definition: flags & 4 != 0,
        eval_expression_following_two_backslashes: flags & 8 != 0,
        ..JspOptions::default()
    };
    let loader = MemoryResourceLoader::new()
        .with("/fuzz.jsp", body)
        .with("/inc.jspf", body);
    let _ = Translator::new(&loader).with_options(options).translate("/fuzz.jsp");
});
