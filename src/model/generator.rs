//! U-Net style generator for underwater color and contrast restoration.
//!
//! The architecture is described by two stage tables, [`DOWN_STAGES`] and
//! [`UP_STAGES`], plus the [`HEAD`] record. [`Generator::new`] builds one
//! module per table row and [`Generator::forward`] walks them in order,
//! wiring skip connections by position.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::tensor::activation::{leaky_relu, relu, tanh};
use burn::tensor::backend::Backend;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use burn::tensor::Tensor;

use crate::error::{Error, Result};

/// Kernel size shared by every convolution in the network.
pub const KERNEL_SIZE: usize = 4;

/// Negative slope of the encoder activations.
pub const LEAKY_SLOPE: f64 = 0.2;

/// One encoder stage: 4×4 conv (stride 2, padding 1, no bias), optional
/// batch norm, leaky ReLU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownStageSpec {
    pub input: usize,
    pub output: usize,
    pub norm: bool,
}

impl DownStageSpec {
    #[must_use]
    pub const fn new(input: usize, output: usize, norm: bool) -> Self {
        Self {
            input,
            output,
            norm,
        }
    }
}

/// One decoder stage: 4×4 transposed conv (stride 2, padding 1, no bias),
/// batch norm, ReLU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpStageSpec {
    pub input: usize,
    pub output: usize,
}

impl UpStageSpec {
    #[must_use]
    pub const fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }
}

/// Output stage: 2× nearest upsample, zero pad left/top by one, 4×4 conv
/// (stride 1, padding 1, with bias), tanh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadSpec {
    pub input: usize,
    pub output: usize,
}

pub const DOWN_STAGES: [DownStageSpec; 5] = [
    DownStageSpec::new(3, 32, false),
    DownStageSpec::new(32, 128, true),
    DownStageSpec::new(128, 256, true),
    DownStageSpec::new(256, 256, true),
    DownStageSpec::new(256, 256, false),
];

/// Stage k >= 2 consumes the previous stage's output concatenated with the
/// matching encoder output, so its input width is the sum of both.
pub const UP_STAGES: [UpStageSpec; 4] = [
    UpStageSpec::new(256, 256),
    UpStageSpec::new(512, 256),
    UpStageSpec::new(512, 128),
    UpStageSpec::new(256, 32),
];

pub const HEAD: HeadSpec = HeadSpec {
    input: 64,
    output: 3,
};

#[derive(Module, Debug)]
pub struct DownStage<B: Backend> {
    conv: Conv2d<B>,
    norm: Option<BatchNorm<B, 2>>,
}

impl<B: Backend> DownStage<B> {
    fn new(spec: &DownStageSpec, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([spec.input, spec.output], [KERNEL_SIZE, KERNEL_SIZE])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let norm = spec
            .norm
            .then(|| BatchNormConfig::new(spec.output).init(device));

        Self { conv, norm }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        let output = match &self.norm {
            Some(norm) => norm.forward(output),
            None => output,
        };
        leaky_relu(output, LEAKY_SLOPE)
    }
}

#[derive(Module, Debug)]
pub struct UpStage<B: Backend> {
    conv: ConvTranspose2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> UpStage<B> {
    fn new(spec: &UpStageSpec, device: &B::Device) -> Self {
        let conv =
            ConvTranspose2dConfig::new([spec.input, spec.output], [KERNEL_SIZE, KERNEL_SIZE])
                .with_stride([2, 2])
                .with_padding([1, 1])
                .with_bias(false)
                .init(device);
        let norm = BatchNormConfig::new(spec.output).init(device);

        Self { conv, norm }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        let output = self.norm.forward(output);
        relu(output)
    }
}

/// Generator network.
///
/// Expects `[1, 3, 256, 256]` input in [0, 1] and produces the same shape in
/// (-1, 1). Parameters are never mutated after construction. burn parameters
/// initialise lazily, so the generator is `Send` but not `Sync`.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    down: Vec<DownStage<B>>,
    up: Vec<UpStage<B>>,
    head: Conv2d<B>,
}

impl<B: Backend> Generator<B> {
    /// Build the generator from the stage tables with freshly initialised
    /// parameters.
    pub fn new(device: &B::Device) -> Self {
        let down = DOWN_STAGES
            .iter()
            .map(|spec| DownStage::new(spec, device))
            .collect();
        let up = UP_STAGES
            .iter()
            .map(|spec| UpStage::new(spec, device))
            .collect();
        let head = Conv2dConfig::new([HEAD.input, HEAD.output], [KERNEL_SIZE, KERNEL_SIZE])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        Self { down, up, head }
    }

    /// Run the network.
    ///
    /// Skip connections concatenate decoder output first and encoder output
    /// second along the channel axis.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips: Vec<Tensor<B, 4>> = Vec::with_capacity(self.down.len());
        let mut x = input;
        for stage in &self.down {
            x = stage.forward(x);
            skips.push(x.clone());
        }
        // Innermost encoder output feeds the decoder directly.
        skips.pop();

        for stage in &self.up {
            x = stage.forward(x);
            if let Some(skip) = skips.pop() {
                x = Tensor::cat(vec![x, skip], 1);
            }
        }

        let [_, _, height, width] = x.dims();
        let x = interpolate(
            x,
            [height * 2, width * 2],
            InterpolateOptions::new(InterpolateMode::Nearest),
        );
        let x = x.pad((1, 0, 1, 0), 0.0);
        tanh(self.head.forward(x))
    }

    /// Check every parameter against the stage tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WeightMismatch`] naming the first offending parameter.
    pub fn verify(&self) -> Result<()> {
        expect_len("down", DOWN_STAGES.len(), self.down.len())?;
        expect_len("up", UP_STAGES.len(), self.up.len())?;

        for (i, (stage, spec)) in self.down.iter().zip(DOWN_STAGES.iter()).enumerate() {
            let name = format!("down{}", i + 1);
            expect_dims(
                &format!("{name}.conv.weight"),
                &[spec.output, spec.input, KERNEL_SIZE, KERNEL_SIZE],
                &stage.conv.weight.val().dims(),
            )?;
            match (&stage.norm, spec.norm) {
                (Some(norm), true) => verify_norm(&name, norm, spec.output)?,
                (None, false) => {}
                (present, _) => {
                    return Err(Error::WeightMismatch {
                        parameter: format!("{name}.norm"),
                        expected: if spec.norm { "batch norm" } else { "no batch norm" }
                            .to_string(),
                        actual: if present.is_some() { "batch norm" } else { "no batch norm" }
                            .to_string(),
                    });
                }
            }
        }

        for (i, (stage, spec)) in self.up.iter().zip(UP_STAGES.iter()).enumerate() {
            let name = format!("up{}", i + 1);
            // Transposed convolutions store weights as [in, out, k, k].
            expect_dims(
                &format!("{name}.conv.weight"),
                &[spec.input, spec.output, KERNEL_SIZE, KERNEL_SIZE],
                &stage.conv.weight.val().dims(),
            )?;
            verify_norm(&name, &stage.norm, spec.output)?;
        }

        expect_dims(
            "final.conv.weight",
            &[HEAD.output, HEAD.input, KERNEL_SIZE, KERNEL_SIZE],
            &self.head.weight.val().dims(),
        )?;
        match &self.head.bias {
            Some(bias) => expect_dims("final.conv.bias", &[HEAD.output], &bias.val().dims()),
            None => Err(Error::WeightMismatch {
                parameter: "final.conv.bias".to_string(),
                expected: format!("[{}]", HEAD.output),
                actual: "missing".to_string(),
            }),
        }
    }
}

fn verify_norm<B: Backend>(stage: &str, norm: &BatchNorm<B, 2>, channels: usize) -> Result<()> {
    let expected = [channels];
    expect_dims(&format!("{stage}.norm.weight"), &expected, &norm.gamma.val().dims())?;
    expect_dims(&format!("{stage}.norm.bias"), &expected, &norm.beta.val().dims())?;
    expect_dims(
        &format!("{stage}.norm.running_mean"),
        &expected,
        &norm.running_mean.value().dims(),
    )?;
    expect_dims(
        &format!("{stage}.norm.running_var"),
        &expected,
        &norm.running_var.value().dims(),
    )
}

fn expect_dims(parameter: &str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(Error::WeightMismatch {
        parameter: parameter.to_string(),
        expected: format!("{expected:?}"),
        actual: format!("{actual:?}"),
    })
}

fn expect_len(parameter: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(Error::WeightMismatch {
        parameter: parameter.to_string(),
        expected: format!("{expected} stages"),
        actual: format!("{actual} stages"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use burn::backend::NdArray;
    use burn::module::Param;
    use burn::tensor::{Distribution, Shape};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_stage_tables_chain() {
        for pair in DOWN_STAGES.windows(2) {
            assert_eq!(pair[0].output, pair[1].input);
        }
        assert_eq!(UP_STAGES[0].input, DOWN_STAGES[4].output);
        // Every later decoder stage reads its predecessor plus one skip.
        for k in 1..UP_STAGES.len() {
            let skip = DOWN_STAGES[DOWN_STAGES.len() - 1 - k].output;
            assert_eq!(UP_STAGES[k].input, UP_STAGES[k - 1].output + skip);
        }
        assert_eq!(HEAD.input, UP_STAGES[3].output + DOWN_STAGES[0].output);
        assert!(!DOWN_STAGES[0].norm && !DOWN_STAGES[4].norm);
    }

    #[test]
    fn test_fresh_generator_verifies() {
        let device = Default::default();
        let generator = Generator::<TestBackend>::new(&device);
        generator.verify().unwrap();
    }

    fn mismatched_parameter(err: Error) -> String {
        assert_eq!(err.kind(), ErrorKind::Load);
        match err {
            Error::WeightMismatch { parameter, .. } => parameter,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_norm_fails_verification() {
        let device = Default::default();
        let mut record = Generator::<TestBackend>::new(&device).into_record();
        record.down[1].norm = None;
        let generator = Generator::<TestBackend>::new(&device).load_record(record);

        let err = generator.verify().unwrap_err();
        assert_eq!(mismatched_parameter(err), "down2.norm");
    }

    #[test]
    fn test_extra_norm_fails_verification() {
        let device = Default::default();
        let mut generator = Generator::<TestBackend>::new(&device);
        generator.down[4].norm = Some(BatchNormConfig::new(256).init(&device));

        let err = generator.verify().unwrap_err();
        assert_eq!(mismatched_parameter(err), "down5.norm");
    }

    #[test]
    fn test_wrong_conv_shape_fails_verification() {
        let device = Default::default();
        let mut generator = Generator::<TestBackend>::new(&device);
        generator.up[2].conv.weight = Param::from_tensor(Tensor::zeros([512, 64, 4, 4], &device));

        let err = generator.verify().unwrap_err();
        assert_eq!(mismatched_parameter(err), "up3.conv.weight");
    }

    #[test]
    fn test_missing_head_bias_fails_verification() {
        let device = Default::default();
        let mut generator = Generator::<TestBackend>::new(&device);
        generator.head.bias = None;

        let err = generator.verify().unwrap_err();
        assert_eq!(mismatched_parameter(err), "final.conv.bias");
    }

    #[test]
    fn test_forward_shape_and_range() {
        let device = Default::default();
        let generator = Generator::<TestBackend>::new(&device);

        let input = Tensor::<TestBackend, 4>::random(
            Shape::new([1, 3, 256, 256]),
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let output = generator.forward(input);

        assert_eq!(output.dims(), [1, 3, 256, 256]);
        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
