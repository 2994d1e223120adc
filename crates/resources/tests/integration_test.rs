//! Integration tests for model loading.

use std::path::Path;

use lantern_resources::Model;

#[test]
fn test_load_glb_model() {
    let model_path = Path::new("../../assets/models/monkey.glb");

    // Skip when assets are not checked out (CI may not have them)
    if !model_path.exists() {
        println!("Skipping test: model file not found at {:?}", model_path);
        return;
    }

    let model = Model::load(model_path).expect("Failed to load glTF model");

    assert!(
        !model.submeshes.is_empty(),
        "Model should have at least one submesh"
    );
    assert!(!model.vertices.is_empty(), "Model should have vertices");
    assert!(!model.indices.is_empty(), "Model should have indices");

    // Submesh ranges must exactly tile the flattened arrays
    let total_vertices: u32 = model.submeshes.iter().map(|s| s.vertex_count).sum();
    let total_indices: u32 = model.submeshes.iter().map(|s| s.index_count).sum();
    assert_eq!(total_vertices as usize, model.vertex_count());
    assert_eq!(total_indices as usize, model.index_count());

    // Every index must stay inside its submesh's vertex range
    for (i, submesh) in model.submeshes.iter().enumerate() {
        let start = submesh.index_start as usize;
        let end = start + submesh.index_count as usize;
        for &index in &model.indices[start..end] {
            assert!(
                index < submesh.vertex_count,
                "Submesh {} has out-of-range index {}",
                i,
                index
            );
        }
    }

    println!(
        "Loaded model: {} submeshes, {} vertices, {} indices",
        model.submeshes.len(),
        model.vertex_count(),
        model.index_count()
    );
}
