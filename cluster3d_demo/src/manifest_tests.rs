//! Unit tests for manifest.rs

use super::*;

// ============================================================================
// PARSING TESTS
// ============================================================================

#[test]
fn test_empty_manifest_uses_section_defaults() {
    let manifest = Manifest::parse("").unwrap();
    assert_eq!(manifest.window, WindowSection::default());
    assert_eq!(manifest.shaders, ShaderSection::default());
    // An explicit file lists its own models
    assert!(manifest.models.is_empty());
}

#[test]
fn test_models_and_window_parse() {
    let manifest = Manifest::parse(r#"
        demo_lights = false

        [window]
        width = 800
        height = 600
        vsync = false

        [[model]]
        path = "assets/a.glb"
        translation = [1.0, 2.0, 3.0]
        rotation = { axis = [0.0, 1.0, 0.0], degrees = 90.0 }
        scale = 0.5

        [[model]]
        path = "assets/b.gltf"
    "#).unwrap();

    assert!(!manifest.demo_lights);
    assert_eq!((manifest.window.width, manifest.window.height), (800, 600));
    assert!(!manifest.window.vsync);
    assert_eq!(manifest.window.title, "Cluster3D");
    assert_eq!(manifest.models.len(), 2);
    assert_eq!(manifest.models[0].scale, 0.5);
    assert_eq!(manifest.models[1].scale, 1.0);
    assert_eq!(manifest.models[1].rotation, None);
}

#[test]
fn test_unknown_key_is_rejected() {
    let result = Manifest::parse("[window]\nwdth = 10\n");
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_zero_window_is_rejected() {
    assert!(Manifest::parse("[window]\nwidth = 0\n").is_err());
}

#[test]
fn test_bad_model_values_are_rejected() {
    assert!(Manifest::parse("[[model]]\npath = \"a.glb\"\nscale = 0.0\n").is_err());
    assert!(Manifest::parse(
        "[[model]]\npath = \"a.glb\"\nrotation = { axis = [0.0, 0.0, 0.0], degrees = 5.0 }\n"
    ).is_err());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let manifest = Manifest::load(Path::new("no/such/cluster3d.toml")).unwrap();
    assert_eq!(manifest, Manifest::default());
    assert_eq!(manifest.models.len(), 4);
}

// ============================================================================
// TRANSFORM TESTS
// ============================================================================

#[test]
fn test_transform_scales_then_rotates_then_translates() {
    let entry = ModelEntry {
        path: PathBuf::from("a.glb"),
        translation: [10.0, 0.0, 0.0],
        rotation: Some(Rotation { axis: [0.0, 0.0, 1.0], degrees: 90.0 }),
        scale: 2.0,
    };
    let p = entry.transform().transform_point3(Vec3::X);
    assert!((p - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
}

#[test]
fn test_identity_entry() {
    let entry = ModelEntry {
        path: PathBuf::from("a.glb"),
        translation: [0.0; 3],
        rotation: None,
        scale: 1.0,
    };
    assert_eq!(entry.transform(), Mat4::IDENTITY);
}
