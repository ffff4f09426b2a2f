use crate::{
    render::{AssetBackend, TerrainRenderer},
    terrain::{Terrain, TerrainConfig, TerrainViews},
};
use bevy::{prelude::*, window::PrimaryWindow};

/// The renderer of a terrain whose resources are stored as bevy assets.
pub type AssetTerrainRenderer = TerrainRenderer<Handle<Mesh>, Handle<Image>>;

/// Builds the terrain at startup and selects the visible tiles of its views every frame.
#[derive(Default)]
pub struct TerrainPlugin {
    pub config: TerrainConfig,
}

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .add_systems(Startup, setup_terrain)
            .add_systems(
                PostUpdate,
                update_terrain_views.run_if(resource_exists::<TerrainViews>),
            );
    }
}

/// Builds the [`Terrain`] and its [`TerrainViews`].
///
/// The rasters and meshes are only uploaded if the asset storages exist.
/// A terrain that can not be built is fatal.
pub fn setup_terrain(
    mut commands: Commands,
    config: Res<TerrainConfig>,
    meshes: Option<ResMut<Assets<Mesh>>>,
    images: Option<ResMut<Assets<Image>>>,
) {
    let terrain = match Terrain::new(config.clone()) {
        Ok(terrain) => terrain,
        Err(error) => panic!("failed to build the terrain: {error:?}"),
    };

    if let (Some(mut meshes), Some(mut images)) = (meshes, images) {
        let mut backend = AssetBackend {
            meshes: &mut *meshes,
            images: &mut *images,
        };

        commands.insert_resource(AssetTerrainRenderer::new(&terrain, &mut backend));
    }

    info!(
        "Terrain ready with {} levels.",
        terrain.height_field().max_level() + 1
    );

    commands.insert_resource(TerrainViews::new(&terrain));
    commands.insert_resource(terrain);
}

/// Runs the primary and the reflection pass of the frame.
pub fn update_terrain_views(
    mut views: ResMut<TerrainViews>,
    config: Res<TerrainConfig>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    if let Ok(window) = windows.get_single() {
        let viewport = UVec2::new(window.physical_width(), window.physical_height());

        if viewport.x > 0 && viewport.y > 0 {
            views.resize(viewport, &config);
        }
    }

    views.update();
}
