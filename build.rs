use std::fs;
use std::path::Path;

/// Declares one module per rule directory so new rules only need a `mod.rs`.
fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set");
    let rules_dir = Path::new(&manifest_dir).join("src").join("rules");
    println!("cargo:rerun-if-changed={}", rules_dir.display());

    let mut modules: Vec<String> = fs::read_dir(&rules_dir)
        .unwrap_or_else(|err| panic!("read {}: {err}", rules_dir.display()))
        .filter_map(Result::ok)
        .filter(|entry| entry.path().join("mod.rs").is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    modules.sort();

    let mut content = String::new();
    for module in &modules {
        let rule_path = rules_dir.join(module).join("mod.rs");
        println!("cargo:rerun-if-changed={}", rule_path.display());
        content.push_str(&format!(
            "#[path = {:?}]\npub(crate) mod {module};\n",
            rule_path
        ));
    }

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR is set");
    let dest = Path::new(&out_dir).join("rule_modules.rs");
    fs::write(&dest, content).unwrap_or_else(|err| panic!("write {}: {err}", dest.display()));
}
