#![no_main]

use libfuzzer_sys::fuzz_target;
use holdwarp::config::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let loader = ConfigLoader::with_defaults();

        // Any accepted config must describe a usable project ring.
        if let Ok(loaded) = loader.load_from_str(yaml_str) {
            let settings = &loaded.settings;
            assert!(!settings.projects.is_empty());
            assert!(settings.projects.iter().any(|p| p.id == settings.start_project));
            assert!(settings.warp.charge_step > 0);
        }
    }
});
