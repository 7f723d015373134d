/*!
# Cluster 3D Engine

Core of a mesh-shading renderer.

Imported triangle meshes are deduplicated, cache-optimized and clustered
into meshlets, uploaded once into GPU-only buffers addressed through device
addresses, then drawn every frame by a double-buffered frame loop.

Backends (the Vulkan plugin) implement the traits of the `render` module.

## Architecture

- **GraphicsDevice**: factory and queue trait implemented by the backend
- **GpuResourceAllocator**: buffer/image creation with usage and residency hints
- **MeshletBuilder**: remap, cache, overdraw and fetch optimization, clustering
- **GeometryImporter**: shared vertex/index pools fed from parsed glTF
- **SceneUploadManager**: staged, synchronous uploads returning device addresses
- **FrameOrchestrator**: acquire, record, submit, present, recover
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod graphics_device;
pub mod resource;
pub mod mesh;
pub mod scene;
pub mod upload;
pub mod frame;

// Main cluster3d namespace module
pub mod cluster3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging entry point
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{Config, MeshletConfig, CameraConfig, DebugSeverity};

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Graphics device traits and value types
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // GPU resource allocation
    pub mod resource {
        pub use crate::resource::*;
    }

    // Mesh processing pipeline
    pub mod mesh {
        pub use crate::mesh::*;
    }

    // Scene model and asset import
    pub mod scene {
        pub use crate::scene::*;
    }

    // Uploads and push constants
    pub mod upload {
        pub use crate::upload::*;
    }

    // Frame loop
    pub mod frame {
        pub use crate::frame::*;
    }
}

// Re-export math library at crate root
pub use glam;
