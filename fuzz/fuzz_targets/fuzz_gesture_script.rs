#![no_main]

use libfuzzer_sys::fuzz_target;
use holdwarp::script::GestureScript;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        if let Ok(script) = GestureScript::from_yaml(yaml_str) {
            assert!(script.steps.windows(2).all(|w| w[0].at <= w[1].at));
            assert!(script.steps.iter().all(|s| s.at <= script.duration));
        }
    }
});
