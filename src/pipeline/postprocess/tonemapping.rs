//! Tonemapping post-processing

use bytemuck::{Pod, Zeroable};

use crate::backend::Fragment;
use crate::pipeline::stage::{PostProcessStage, StageContext, StageError};
use crate::render_graph::{CommandStream, Material, RenderTargetId};
use crate::scene::CameraView;

pub const TONEMAPPING_SHADER: &str = "PostProcess/Tonemapping";

/// Tonemapping operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TonemapOperator {
    Reinhard,
    Aces,
    Uncharted2,
    None,
}

impl Default for TonemapOperator {
    fn default() -> Self {
        TonemapOperator::Aces
    }
}

impl TonemapOperator {
    fn index(self) -> u32 {
        match self {
            TonemapOperator::Reinhard => 0,
            TonemapOperator::Aces => 1,
            TonemapOperator::Uncharted2 => 2,
            TonemapOperator::None => 3,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TonemapParams {
    pub exposure: f32,
    pub gamma: f32,
    pub operator: u32,
    _padding: u32,
}

/// Tonemapping post-processing stage
#[derive(Debug, Clone)]
pub struct TonemappingStage {
    pub operator: TonemapOperator,
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for TonemappingStage {
    fn default() -> Self {
        Self::new(TonemapOperator::Aces)
    }
}

impl TonemappingStage {
    pub fn new(operator: TonemapOperator) -> Self {
        Self {
            operator,
            exposure: 1.0,
            gamma: 2.2,
        }
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn params(&self) -> TonemapParams {
        TonemapParams {
            exposure: self.exposure,
            gamma: self.gamma,
            operator: self.operator.index(),
            _padding: 0,
        }
    }
}

impl PostProcessStage for TonemappingStage {
    fn name(&self) -> &str {
        "Tonemapping"
    }

    fn process(
        &self,
        _ctx: &StageContext<'_>,
        commands: &mut CommandStream,
        _camera: &CameraView,
        source: RenderTargetId,
        destination: RenderTargetId,
    ) -> Result<(), StageError> {
        if !(self.exposure > 0.0 && self.gamma > 0.0) {
            return Err(StageError::Failed(format!(
                "exposure ({}) and gamma ({}) must be positive",
                self.exposure, self.gamma
            )));
        }

        commands.blit_with_material(
            source,
            destination,
            Material::new(TONEMAPPING_SHADER).with_uniform(&self.params()),
        );
        Ok(())
    }
}

fn aces(c: f32) -> f32 {
    let (a, b, cc, d, e) = (2.51, 0.03, 2.43, 0.59, 0.14);
    ((c * (a * c + b)) / (c * (cc * c + d) + e)).clamp(0.0, 1.0)
}

fn reinhard(c: f32) -> f32 {
    c / (c + 1.0)
}

fn uncharted2_curve(x: f32) -> f32 {
    let (a, b, c, d, e, f) = (0.15, 0.50, 0.10, 0.20, 0.02, 0.30);
    ((x * (a * x + c * b) + d * e) / (x * (a * x + b) + d * f)) - e / f
}

fn uncharted2(c: f32) -> f32 {
    const WHITE_POINT: f32 = 11.2;
    (uncharted2_curve(c * 2.0) / uncharted2_curve(WHITE_POINT)).clamp(0.0, 1.0)
}

/// Reference kernel for [`TONEMAPPING_SHADER`]
pub fn tonemap_kernel(fragment: &Fragment<'_>) -> [f32; 4] {
    let params = fragment.uniform::<TonemapParams>().unwrap_or(TonemapParams {
        exposure: 1.0,
        gamma: 2.2,
        operator: TonemapOperator::Aces.index(),
        _padding: 0,
    });

    let map = |c: f32| {
        let c = (c * params.exposure).max(0.0);
        let mapped = match params.operator {
            0 => reinhard(c),
            1 => aces(c),
            2 => uncharted2(c),
            _ => c.clamp(0.0, 1.0),
        };
        mapped.powf(1.0 / params.gamma)
    };

    let [r, g, b, _] = fragment.color;
    [map(r), map(g), map(b), 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PostProcessSettings;
    use crate::render_graph::{Command, PropertyId};
    use crate::scene::{Camera, Transform};
    use bevy_ecs::world::World;

    fn view() -> CameraView {
        let mut world = World::new();
        let entity = world.spawn((Transform::default(), Camera::default())).id();
        CameraView::extract(&world, entity).unwrap()
    }

    #[test]
    fn records_material_blit() {
        let stage = TonemappingStage::new(TonemapOperator::Reinhard).with_exposure(2.0);
        let settings = PostProcessSettings::default();
        let mut commands = CommandStream::new("test");
        let source = RenderTargetId::Temporary(PropertyId::from_name("_Source"));

        stage
            .process(
                &StageContext::new(&settings, 0),
                &mut commands,
                &view(),
                source,
                RenderTargetId::CameraTarget,
            )
            .unwrap();

        let Command::Blit {
            material: Some(material),
            ..
        } = &commands.commands()[0]
        else {
            panic!("expected a material blit");
        };
        assert_eq!(material.shader, TONEMAPPING_SHADER);
        let params = material.uniform::<TonemapParams>().unwrap();
        assert_eq!(params.exposure, 2.0);
        assert_eq!(params.operator, 0);
    }

    #[test]
    fn rejects_non_positive_gamma() {
        let stage = TonemappingStage::default().with_gamma(0.0);
        let settings = PostProcessSettings::default();
        let mut commands = CommandStream::new("test");
        let result = stage.process(
            &StageContext::new(&settings, 0),
            &mut commands,
            &view(),
            RenderTargetId::Temporary(PropertyId::from_name("_Source")),
            RenderTargetId::CameraTarget,
        );
        assert!(matches!(result, Err(StageError::Failed(_))));
        assert!(commands.is_empty());
    }

    #[test]
    fn operator_curves() {
        assert_eq!(reinhard(1.0), 0.5);
        assert_eq!(aces(0.0), 0.0);
        assert!(aces(100.0) <= 1.0);
        assert!(uncharted2(1.0) > 0.0 && uncharted2(1.0) < 1.0);
    }
}
