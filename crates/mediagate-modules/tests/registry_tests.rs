use mediagate_core::{GatewayConfig, ModuleRegistry, ProviderClient, config::ModuleSettings};
use mediagate_modules::{SimulatedProvider, build_registry};
use serde_json::json;
use std::sync::Arc;

fn provider() -> Arc<dyn ProviderClient> {
    Arc::new(SimulatedProvider::new())
}

fn registry(config: &GatewayConfig) -> ModuleRegistry {
    build_registry(config, provider()).expect("built-in modules register cleanly")
}

#[test]
fn all_modules_enabled_by_default() {
    let registry = registry(&GatewayConfig::default());

    assert_eq!(registry.module_count(), 2);
    let names: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(
        names,
        [
            "img_edit",
            "img_generate",
            "img_tag",
            "vid_generate",
            "vid_job_status",
            "vid_job_wait",
        ]
    );
}

#[test]
fn disabled_module_is_not_registered() {
    let mut config = GatewayConfig::default();
    config
        .modules
        .insert("video".to_string(), ModuleSettings { enabled: false });

    let registry = registry(&config);
    assert_eq!(registry.module_count(), 1);
    assert!(registry.get("vid_generate").is_none());
    assert!(registry.get("img_generate").is_some());
}

#[test]
fn discovery_schemas_carry_required_fields_and_defaults() {
    let registry = registry(&GatewayConfig::default());
    let tools = registry.list_tools();

    let generate = tools.iter().find(|t| t.name == "img_generate").unwrap();
    assert_eq!(generate.module, "image");
    assert_eq!(generate.input_schema["type"], "object");
    assert_eq!(generate.input_schema["required"], json!(["prompt"]));
    assert_eq!(
        generate.input_schema["properties"]["size"]["enum"],
        json!(["512x512", "1024x1024", "1792x1024", "1024x1792"])
    );
    assert_eq!(
        generate.input_schema["properties"]["size"]["default"],
        "1024x1024"
    );

    let video = tools.iter().find(|t| t.name == "vid_generate").unwrap();
    assert_eq!(video.input_schema["required"], json!(["prompt"]));
    assert_eq!(video.input_schema["properties"]["wait"]["type"], "boolean");

    let wait = tools.iter().find(|t| t.name == "vid_job_wait").unwrap();
    assert_eq!(wait.input_schema["required"], json!(["job_id"]));
}

#[test]
fn registry_from_config_toml() {
    let config = GatewayConfig::from_toml_str(
        r#"
        [modules.image]
        enabled = false
        "#,
    )
    .unwrap();

    let registry = registry(&config);
    assert_eq!(registry.tool_count(), 3);
    assert!(registry.list_tools().iter().all(|t| t.module == "video"));
}
