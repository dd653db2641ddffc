#![no_main]

use jsp::{MemoryResourceLoader, Translator};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let loader = MemoryResourceLoader::new().with("/fuzz.jspx", data);
    let _ = Translator::new(&loader).translate("/fuzz.jspx");
});
