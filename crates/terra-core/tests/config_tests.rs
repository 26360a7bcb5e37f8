use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use terra_config::{ConfigDocument, ConfigError};
use terra_core::{
    core_registry, load_config, save_config, BufferAmount, BufferTransformer, ClassConfig, DataError,
    GeoJsonVectorSourceConfig, GeometryType, LabelSourceConfig, LabelStoreConfig, ObjectDetectionLabelSourceConfig,
    RasterSourceConfig, RasterTransformerConfig, ReclassTransformer, SceneConfig, VectorSourceConfig,
    VectorTransformerConfig,
};
use terra_test_utils::to_dict;

fn full_scene() -> SceneConfig {
    let mut raster = terra_core::GeoTiffSourceConfig::new("image.tif");
    raster.channel_order = Some(vec![2, 1, 0]);
    raster.transformers.push(RasterTransformerConfig::Reclass(ReclassTransformer {
        mapping: [(1, 0), (2, 1)].into_iter().collect(),
    }));

    let vector = GeoJsonVectorSourceConfig::new("labels.json").with_transformer(
        BufferTransformer::new(GeometryType::Polygon)
            .with_class_buf(1, BufferAmount::Distance(5.0))
            .with_class_buf(2, BufferAmount::NoBuffer)
            .with_default_buf(BufferAmount::Distance(2.0)),
    );

    SceneConfig::new("scene-1", RasterSourceConfig::GeoTiff(raster))
        .with_label_source(LabelSourceConfig::ObjectDetection(ObjectDetectionLabelSourceConfig {
            vector_source: vector.into(),
        }))
        .with_label_store(LabelStoreConfig::object_detection(Some("out/scene-1.json".to_string())))
        .with_aoi_uris(["aoi/a.json", "aoi/b.json"])
}

#[test]
fn scene_roundtrips_through_registry() {
    let registry = core_registry();
    let config = full_scene();

    let dict = registry.to_dict(&config).unwrap();
    let restored: SceneConfig = registry.from_dict(dict).unwrap();
    assert_eq!(restored, config);
}

#[test]
fn versions_stamped_at_every_boundary() {
    let dict = Value::Object(core_registry().to_dict(&full_scene()).unwrap());

    assert_eq!(dict["version"], json!(5));
    assert_eq!(dict["raster_source"]["version"], json!(1));
    assert_eq!(dict["raster_source"]["transformers"][0]["version"], json!(1));
    assert_eq!(dict["label_source"]["vector_source"]["version"], json!(2));
    assert_eq!(dict["label_source"]["vector_source"]["transformers"][0]["type_hint"], json!("buffer_transformer"));
    assert_eq!(dict["label_source"]["vector_source"]["transformers"][0]["class_bufs"], json!({"1": 5.0, "2": null}));
    assert_eq!(dict["label_store"]["version"], json!(1));
}

#[test]
fn v4_scene_without_aoi_geometries_only_changes_version() {
    let v4 = to_dict(json!({
        "type_hint": "scene",
        "version": 4,
        "id": "s1",
        "raster_source": {"type_hint": "geotiff_source", "uri": "image.tif"},
    }));

    let upgraded = core_registry().upgrade(v4.clone()).unwrap();

    let mut expected = v4;
    expected.insert("version".to_string(), json!(5));
    expected["raster_source"]
        .as_object_mut()
        .unwrap()
        .insert("version".to_string(), json!(1));
    assert_eq!(upgraded, expected);
}

#[test]
fn v4_scene_null_aoi_geometries_removed() {
    let v4 = to_dict(json!({
        "type_hint": "scene",
        "version": 4,
        "id": "s1",
        "raster_source": {"type_hint": "geotiff_source", "uri": "image.tif"},
        "aoi_geometries": null,
    }));

    let upgraded = core_registry().upgrade(v4).unwrap();
    assert!(!upgraded.contains_key("aoi_geometries"));
    let config: SceneConfig = core_registry().from_dict(upgraded).unwrap();
    assert_eq!(config.aoi_uris, None);
}

#[test]
fn v4_scene_with_inline_geometries_aborts_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.yaml");
    std::fs::write(
        &path,
        "
type_hint: scene
version: 4
id: s1
raster_source:
  type_hint: geotiff_source
  uri: image.tif
aoi_geometries:
  - type: Polygon
    coordinates: [[[0, 0], [1, 0], [1, 1], [0, 0]]]
",
    )
    .unwrap();

    let err = load_config::<SceneConfig>(&path).unwrap_err();
    let DataError::Config(ConfigError::Deprecated { ref field, ref hint }) = err else {
        panic!("expected deprecation error, got {err}");
    };
    assert_eq!(field.as_str(), "aoi_geometries");
    assert!(hint.contains("aoi_uris"));
}

fn rejected_field(result: Result<SceneConfig, ConfigError>) -> String {
    match result {
        Err(ConfigError::InvalidJson(e)) => e.to_string(),
        other => panic!("expected an unknown field error, got {other:?}"),
    }
}

#[test]
fn current_scene_with_aoi_geometries_rejected() {
    let polygon = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]});
    for version in [Value::Null, json!(5)] {
        let mut dict = to_dict(json!({
            "type_hint": "scene",
            "id": "s1",
            "raster_source": {"type_hint": "geotiff_source", "uri": "image.tif"},
            "aoi_geometries": [polygon.clone()],
        }));
        if !version.is_null() {
            dict.insert("version".to_string(), version);
        }

        let message = rejected_field(core_registry().from_dict(dict));
        assert!(message.contains("aoi_geometries"), "{message}");
    }
}

#[test]
fn misspelled_fields_rejected_at_any_depth() {
    let top = to_dict(json!({
        "type_hint": "scene",
        "version": 5,
        "id": "s1",
        "raster_source": {"type_hint": "geotiff_source", "uri": "image.tif"},
        "aoi_uri": ["typo.json"],
    }));
    assert!(rejected_field(core_registry().from_dict(top)).contains("aoi_uri"));

    let nested = to_dict(json!({
        "type_hint": "scene",
        "id": "s1",
        "raster_source": {"type_hint": "geotiff_source", "version": 1, "url": "image.tif"},
    }));
    assert!(rejected_field(core_registry().from_dict(nested)).contains("url"));
}

#[test]
fn root_of_another_type_rejected() {
    let dict = to_dict(json!({"type_hint": "class_config", "names": ["a"]}));
    assert!(matches!(
        core_registry().from_dict::<SceneConfig>(dict),
        Err(ConfigError::TypeHintMismatch { .. })
    ));
}

#[test]
fn legacy_vector_source_gains_class_inference() {
    let v1 = to_dict(json!({
        "type_hint": "scene",
        "version": 5,
        "id": "s1",
        "raster_source": {"type_hint": "geotiff_source", "uri": "image.tif"},
        "label_source": {
            "type_hint": "object_detection_label_source",
            "vector_source": {
                "type_hint": "geojson_vector_source",
                "version": 1,
                "uri": "labels.json",
                "default_class_id": 3,
            },
        },
    }));

    let config: SceneConfig = core_registry().from_dict(v1).unwrap();
    let Some(LabelSourceConfig::ObjectDetection(od)) = config.label_source else {
        panic!("expected object detection label source");
    };
    let VectorSourceConfig::GeoJson(source) = od.vector_source;
    assert_eq!(source.transformers.len(), 1);
    assert!(matches!(
        &source.transformers[0],
        VectorTransformerConfig::ClassInference(cfg) if cfg.default_class_id == Some(3)
    ));
}

#[test]
fn future_and_unknown_configs_rejected() {
    let future = to_dict(json!({"type_hint": "scene", "version": 6, "id": "s1"}));
    assert!(matches!(
        core_registry().upgrade(future),
        Err(ConfigError::FutureVersion { found: 6, current: 5, .. })
    ));

    let unknown = to_dict(json!({
        "type_hint": "scene",
        "id": "s1",
        "raster_source": {"type_hint": "cog_source", "uri": "image.tif"},
    }));
    assert!(matches!(
        core_registry().upgrade(unknown),
        Err(ConfigError::UnknownTypeHint(ref hint)) if hint == "cog_source"
    ));

    let bad_version = to_dict(json!({"type_hint": "scene", "version": "five", "id": "s1"}));
    assert!(matches!(core_registry().upgrade(bad_version), Err(ConfigError::InvalidVersion { .. })));
}

#[test]
fn save_and_load_json_and_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let config = full_scene();

    for name in ["scene.json", "scene.yaml"] {
        let path = dir.path().join(name);
        save_config(&config, &path).unwrap();
        assert_eq!(load_config::<SceneConfig>(&path).unwrap(), config);
    }

    let doc = ConfigDocument::load(dir.path().join("scene.yaml")).unwrap();
    assert_eq!(doc.type_hint(), Some("scene"));
    assert_eq!(doc.version(), Some(5));
}

#[test]
fn class_config_validated_on_load() {
    let dict = to_dict(json!({
        "type_hint": "class_config",
        "names": ["a", "b"],
        "null_class": "c",
    }));
    assert!(matches!(
        core_registry().from_dict::<ClassConfig>(dict),
        Err(ConfigError::Validation { .. })
    ));
}

#[test]
fn buffer_transformer_from_yaml() {
    let yaml = r#"
type_hint: buffer_transformer
geom_type: LineString
class_bufs:
  "1": 5.0
  "2": null
default_buf: 2.0
"#;
    let dict = ConfigDocument::from_yaml(yaml).unwrap().into_dict();
    let config: VectorTransformerConfig = core_registry().decode(dict).unwrap();

    let VectorTransformerConfig::Buffer(buffer) = config else {
        panic!("expected buffer transformer");
    };
    assert_eq!(buffer.buffer_for(Some(1)), BufferAmount::Distance(5.0));
    assert_eq!(buffer.buffer_for(Some(2)), BufferAmount::NoBuffer);
    assert_eq!(buffer.buffer_for(Some(3)), BufferAmount::Distance(2.0));
    assert_eq!(buffer.buffer_for(None), BufferAmount::Distance(2.0));
}
