use std::ops::{
    Add, BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Div, Index, Mul, Neg, Not, Rem, Sub,
};

use crate::error::RegionError;

/// 体素网格数据结构
/// 表示三维规则网格上的逐点数据（坐标、标量场或布尔占据）
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid<T> {
    /// 网格维度 [nx, ny, nz]
    pub shape: [usize; 3],
    /// 数据数组，按 C 语言顺序存储 (z变化最快，y其次，x最慢)
    /// 索引计算: index = (i * ny + j) * nz + k
    pub data: Vec<T>,
}

/// 实数体素数组（坐标数组或中间计算结果）
pub type Field = VoxelGrid<f64>;

/// 布尔占据体素数组
pub type Occupancy = VoxelGrid<bool>;

impl<T> VoxelGrid<T> {
    /// 创建新的体素网格
    pub fn new(shape: [usize; 3], data: Vec<T>) -> Result<Self, RegionError> {
        let total_elements = shape[0] * shape[1] * shape[2];

        if data.len() != total_elements {
            return Err(RegionError::DataLength {
                shape,
                expected: total_elements,
                actual: data.len(),
            });
        }

        Ok(VoxelGrid { shape, data })
    }

    /// 按下标 [i, j, k] 逐点生成网格
    pub fn from_fn(shape: [usize; 3], mut f: impl FnMut([usize; 3]) -> T) -> Self {
        let mut data = Vec::with_capacity(shape[0] * shape[1] * shape[2]);
        for i in 0..shape[0] {
            for j in 0..shape[1] {
                for k in 0..shape[2] {
                    data.push(f([i, j, k]));
                }
            }
        }
        VoxelGrid { shape, data }
    }

    /// 用同一个值填满整个网格
    pub fn filled(shape: [usize; 3], value: T) -> Self
    where
        T: Clone,
    {
        VoxelGrid {
            shape,
            data: vec![value; shape[0] * shape[1] * shape[2]],
        }
    }

    /// 获取整个数据切片的引用
    pub fn get_data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 三维下标转一维索引，越界返回 None
    pub fn index_of(&self, [i, j, k]: [usize; 3]) -> Option<usize> {
        let [nx, ny, nz] = self.shape;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        Some((i * ny + j) * nz + k)
    }

    pub fn get(&self, index: [usize; 3]) -> Option<&T> {
        self.index_of(index).map(|idx| &self.data[idx])
    }

    /// 逐元素映射
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> VoxelGrid<U> {
        VoxelGrid {
            shape: self.shape,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// 与另一个同形网格逐元素组合
    ///
    /// # Panics
    /// 两个网格形状不一致时 panic（与数组库的广播错误一致，属于调用方编程错误）
    pub fn zip_map<U, V>(&self, other: &VoxelGrid<U>, f: impl Fn(&T, &U) -> V) -> VoxelGrid<V> {
        assert_eq!(
            self.shape, other.shape,
            "体素网格形状不一致: {:?} vs {:?}",
            self.shape, other.shape
        );
        VoxelGrid {
            shape: self.shape,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| f(a, b))
                .collect(),
        }
    }
}

impl<T> Index<[usize; 3]> for VoxelGrid<T> {
    type Output = T;

    fn index(&self, index: [usize; 3]) -> &T {
        match self.index_of(index) {
            Some(idx) => &self.data[idx],
            None => panic!("下标 {:?} 超出网格范围 {:?}", index, self.shape),
        }
    }
}

// ==================== 实数场运算 ====================

/// 比较运算的右操作数：标量或同形实数场
pub trait Operand {
    fn value_at(&self, index: usize) -> f64;

    /// 标量返回 None
    fn operand_shape(&self) -> Option<[usize; 3]>;
}

impl Operand for f64 {
    fn value_at(&self, _index: usize) -> f64 {
        *self
    }

    fn operand_shape(&self) -> Option<[usize; 3]> {
        None
    }
}

impl Operand for &Field {
    fn value_at(&self, index: usize) -> f64 {
        self.data[index]
    }

    fn operand_shape(&self) -> Option<[usize; 3]> {
        Some(self.shape)
    }
}

impl Operand for Field {
    fn value_at(&self, index: usize) -> f64 {
        self.data[index]
    }

    fn operand_shape(&self) -> Option<[usize; 3]> {
        Some(self.shape)
    }
}

impl Field {
    fn compare(&self, rhs: impl Operand, op: impl Fn(f64, f64) -> bool) -> Occupancy {
        if let Some(shape) = rhs.operand_shape() {
            assert_eq!(
                self.shape, shape,
                "体素网格形状不一致: {:?} vs {:?}",
                self.shape, shape
            );
        }
        VoxelGrid {
            shape: self.shape,
            data: self
                .data
                .iter()
                .enumerate()
                .map(|(idx, &value)| op(value, rhs.value_at(idx)))
                .collect(),
        }
    }

    pub fn lt(&self, rhs: impl Operand) -> Occupancy {
        self.compare(rhs, |a, b| a < b)
    }

    pub fn le(&self, rhs: impl Operand) -> Occupancy {
        self.compare(rhs, |a, b| a <= b)
    }

    pub fn gt(&self, rhs: impl Operand) -> Occupancy {
        self.compare(rhs, |a, b| a > b)
    }

    pub fn ge(&self, rhs: impl Operand) -> Occupancy {
        self.compare(rhs, |a, b| a >= b)
    }

    pub fn equals(&self, rhs: impl Operand) -> Occupancy {
        self.compare(rhs, |a, b| a == b)
    }

    pub fn not_equals(&self, rhs: impl Operand) -> Occupancy {
        self.compare(rhs, |a, b| a != b)
    }

    pub fn sqrt(&self) -> Field {
        self.map(|v| v.sqrt())
    }

    pub fn abs(&self) -> Field {
        self.map(|v| v.abs())
    }

    pub fn powf(&self, n: f64) -> Field {
        self.map(|v| v.powf(n))
    }
}

macro_rules! field_binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&Field> for &Field {
            type Output = Field;

            fn $method(self, rhs: &Field) -> Field {
                self.zip_map(rhs, |&a, &b| a $op b)
            }
        }

        impl $trait<Field> for Field {
            type Output = Field;

            fn $method(self, rhs: Field) -> Field {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&Field> for Field {
            type Output = Field;

            fn $method(self, rhs: &Field) -> Field {
                (&self).$method(rhs)
            }
        }

        impl $trait<Field> for &Field {
            type Output = Field;

            fn $method(self, rhs: Field) -> Field {
                self.$method(&rhs)
            }
        }

        impl $trait<f64> for &Field {
            type Output = Field;

            fn $method(self, rhs: f64) -> Field {
                self.map(|&a| a $op rhs)
            }
        }

        impl $trait<f64> for Field {
            type Output = Field;

            fn $method(self, rhs: f64) -> Field {
                (&self).$method(rhs)
            }
        }

        impl $trait<&Field> for f64 {
            type Output = Field;

            fn $method(self, rhs: &Field) -> Field {
                rhs.map(|&b| self $op b)
            }
        }

        impl $trait<Field> for f64 {
            type Output = Field;

            fn $method(self, rhs: Field) -> Field {
                self.$method(&rhs)
            }
        }
    };
}

field_binary_op!(Add, add, +);
field_binary_op!(Sub, sub, -);
field_binary_op!(Mul, mul, *);
field_binary_op!(Div, div, /);
field_binary_op!(Rem, rem, %);

impl Neg for &Field {
    type Output = Field;

    fn neg(self) -> Field {
        self.map(|&v| -v)
    }
}

impl Neg for Field {
    type Output = Field;

    fn neg(self) -> Field {
        -&self
    }
}

// ==================== 布尔占据运算 ====================

impl Occupancy {
    /// 全 false 的占据体
    pub fn empty(shape: [usize; 3]) -> Self {
        Self::filled(shape, false)
    }

    /// 全 true 的占据体
    pub fn full(shape: [usize; 3]) -> Self {
        Self::filled(shape, true)
    }

    /// 为 true 的体素数量
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    pub fn all(&self) -> bool {
        self.data.iter().all(|&v| v)
    }

    /// self AND NOT other
    pub fn and_not(&self, other: &Occupancy) -> Occupancy {
        self.zip_map(other, |&a, &b| a && !b)
    }

    /// 原地清除 other 中为 true 的体素
    pub fn remove(&mut self, other: &Occupancy) {
        assert_eq!(
            self.shape, other.shape,
            "体素网格形状不一致: {:?} vs {:?}",
            self.shape, other.shape
        );
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = *a && !b;
        }
    }

    /// self ⊆ other
    pub fn is_subset_of(&self, other: &Occupancy) -> bool {
        self.shape == other.shape
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(&a, &b)| !a || b)
    }
}

macro_rules! occupancy_binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&Occupancy> for &Occupancy {
            type Output = Occupancy;

            fn $method(self, rhs: &Occupancy) -> Occupancy {
                self.zip_map(rhs, |&a, &b| a $op b)
            }
        }

        impl $trait<Occupancy> for Occupancy {
            type Output = Occupancy;

            fn $method(self, rhs: Occupancy) -> Occupancy {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&Occupancy> for Occupancy {
            type Output = Occupancy;

            fn $method(self, rhs: &Occupancy) -> Occupancy {
                (&self).$method(rhs)
            }
        }

        impl $trait<Occupancy> for &Occupancy {
            type Output = Occupancy;

            fn $method(self, rhs: Occupancy) -> Occupancy {
                self.$method(&rhs)
            }
        }
    };
}

occupancy_binary_op!(BitAnd, bitand, &);
occupancy_binary_op!(BitOr, bitor, |);
occupancy_binary_op!(BitXor, bitxor, ^);

impl Not for &Occupancy {
    type Output = Occupancy;

    fn not(self) -> Occupancy {
        self.map(|&v| !v)
    }
}

impl Not for Occupancy {
    type Output = Occupancy;

    fn not(mut self) -> Occupancy {
        for v in self.data.iter_mut() {
            *v = !*v;
        }
        self
    }
}

impl BitAndAssign<&Occupancy> for Occupancy {
    fn bitand_assign(&mut self, rhs: &Occupancy) {
        assert_eq!(self.shape, rhs.shape, "体素网格形状不一致");
        for (a, &b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a &= b;
        }
    }
}

impl BitOrAssign<&Occupancy> for Occupancy {
    fn bitor_assign(&mut self, rhs: &Occupancy) {
        assert_eq!(self.shape, rhs.shape, "体素网格形状不一致");
        for (a, &b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a |= b;
        }
    }
}
