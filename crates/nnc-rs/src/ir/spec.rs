use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Scalar element types supported by DLA local memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F16,
    Bf16,
    Si8,
    Ui8,
    Si16,
    Ui16,
    Si32,
    Ui32,
}

impl DType {
    /// Returns the storage size in bytes.
    pub fn size_in_bytes(self) -> u64 {
        match self {
            DType::Si8 | DType::Ui8 => 1,
            DType::F16 | DType::Bf16 | DType::Si16 | DType::Ui16 => 2,
            DType::F32 | DType::Si32 | DType::Ui32 => 4,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::Bf16 => "bf16",
            DType::Si8 => "si8",
            DType::Ui8 => "ui8",
            DType::Si16 => "si16",
            DType::Ui16 => "ui16",
            DType::Si32 => "si32",
            DType::Ui32 => "ui32",
        };
        f.write_str(name)
    }
}

/// Dimension list. Common case: N C H W.
pub type Dims = SmallVec<[u64; 4]>;

/// Logical tensor shape as an ordered list of positive integer extents.
///
/// Shapes are always static; dynamic extents are out of scope for the
/// targets this compiler serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Dims,
}

impl Shape {
    pub fn new(dims: impl Into<Dims>) -> Self {
        Self { dims: dims.into() }
    }

    /// Convenience constructor from a slice of extents.
    pub fn of(dims: &[u64]) -> Self {
        Self {
            dims: Dims::from_slice(dims),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// Returns element count, or `None` on arithmetic overflow.
    pub fn element_count(&self) -> Option<u64> {
        let mut count = 1u64;
        for &dim in &self.dims {
            count = count.checked_mul(dim)?;
        }
        Some(count)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, dim) in self.dims.iter().enumerate() {
            if idx > 0 {
                f.write_str("x")?;
            }
            write!(f, "{dim}")?;
        }
        Ok(())
    }
}

/// Tensor metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    /// Returns total byte length, or `None` on arithmetic overflow.
    pub fn byte_len(&self) -> Option<u64> {
        self.shape
            .element_count()?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.dtype, self.shape)
    }
}

/// Operator kind tags known to the compiler.
///
/// `Load` and `Store` are pseudo-operators spliced in by the memory
/// allocation pass to mark DMA points; they carry no arithmetic semantics.
/// `Undefined` tags initializer nodes materialized by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Conv,
    Gemm,
    MaxPool,
    Reshape,
    Relu,
    Sigmoid,
    #[serde(rename = "LRN")]
    Lrn,
    BatchNormalization,
    Softmax,
    Dropout,
    Sum,
    Flatten,
    Load,
    Store,
    Undefined,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Conv => "Conv",
            OpKind::Gemm => "Gemm",
            OpKind::MaxPool => "MaxPool",
            OpKind::Reshape => "Reshape",
            OpKind::Relu => "Relu",
            OpKind::Sigmoid => "Sigmoid",
            OpKind::Lrn => "LRN",
            OpKind::BatchNormalization => "BatchNormalization",
            OpKind::Softmax => "Softmax",
            OpKind::Dropout => "Dropout",
            OpKind::Sum => "Sum",
            OpKind::Flatten => "Flatten",
            OpKind::Load => "Load",
            OpKind::Store => "Store",
            OpKind::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute payload for `Conv`.
///
/// `pads` lists begin padding for every spatial axis followed by end
/// padding: `[b1 .. bn, e1 .. en]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvAttrs {
    pub kernel_shape: Dims,
    pub strides: Dims,
    pub pads: Dims,
}

/// Attribute payload for `MaxPool`. Same layout conventions as [`ConvAttrs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAttrs {
    pub kernel_shape: Dims,
    pub strides: Dims,
    pub pads: Dims,
}

/// Attribute payload for `Gemm`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemmAttrs {
    pub trans_a: bool,
    pub trans_b: bool,
    pub broadcast: bool,
}

/// Kind-specific attribute bag carried by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAttrs {
    None,
    Conv(ConvAttrs),
    Pool(PoolAttrs),
    Gemm(GemmAttrs),
}

impl NodeAttrs {
    pub fn conv(&self) -> Option<&ConvAttrs> {
        match self {
            NodeAttrs::Conv(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn pool(&self) -> Option<&PoolAttrs> {
        match self {
            NodeAttrs::Pool(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn gemm(&self) -> Option<&GemmAttrs> {
        match self {
            NodeAttrs::Gemm(attrs) => Some(attrs),
            _ => None,
        }
    }
}

impl Default for NodeAttrs {
    fn default() -> Self {
        NodeAttrs::None
    }
}
