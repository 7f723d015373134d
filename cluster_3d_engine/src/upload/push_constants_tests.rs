//! Unit tests for push_constants.rs

use glam::{Mat4, Vec3};
use crate::upload::{PushConstantData, SceneInfo};

fn offset_of(data: &PushConstantData, field: *const u8) -> usize {
    field as usize - data as *const PushConstantData as usize
}

#[test]
fn test_layout_matches_shader_block() {
    let data = PushConstantData::default();
    assert_eq!(PushConstantData::SIZE, 216);
    assert_eq!(offset_of(&data, data.world.as_ptr() as *const u8), 64);
    assert_eq!(offset_of(&data, &data.scene_info as *const SceneInfo as *const u8), 128);
    assert_eq!(offset_of(&data, &data.meshlets_address as *const u64 as *const u8), 144);
    assert_eq!(offset_of(&data, &data.mesh_views_address as *const u64 as *const u8), 168);
    assert_eq!(offset_of(&data, &data.point_lights_address as *const u64 as *const u8), 192);
    assert_eq!(offset_of(&data, &data.dir_lights_address as *const u64 as *const u8), 208);
}

#[test]
fn test_default_is_identity_with_null_addresses() {
    let data = PushConstantData::default();
    assert_eq!(data.proj_view(), Mat4::IDENTITY);
    assert_eq!(data.world(), Mat4::IDENTITY);
    assert_eq!(data.scene_info, SceneInfo::default());
    assert_eq!(data.meshlets_address, 0);
    assert_eq!(data.dir_lights_address, 0);
}

#[test]
fn test_transforms_are_column_major() {
    let mut data = PushConstantData::default();
    let translation = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    data.set_transforms(translation, Mat4::IDENTITY);

    assert_eq!(data.proj_view[3], [1.0, 2.0, 3.0, 1.0]);
    let bytes = data.as_bytes();
    assert_eq!(bytes.len(), 216);
    let x = f32::from_ne_bytes([bytes[48], bytes[49], bytes[50], bytes[51]]);
    assert_eq!(x, 1.0);
}

#[test]
fn test_scene_info_follows_matrices() {
    let mut data = PushConstantData::default();
    data.scene_info = SceneInfo {
        mesh_count: 7,
        point_light_count: 1,
        spot_light_count: 101,
        direction_light_count: 1,
    };
    let bytes = data.as_bytes();
    let spot = u32::from_ne_bytes([bytes[136], bytes[137], bytes[138], bytes[139]]);
    assert_eq!(spot, 101);
}
