use nalgebra as na;
use num_traits::AsPrimitive;

pub fn widen<T>(mat: &na::DMatrix<T>) -> na::DMatrix<f64>
where
    T: na::Scalar + AsPrimitive<f64>,
{
    mat.map(|v| v.as_())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn widens_integer_and_single_precision() {
        let a: na::DMatrix<i64> = dmatrix![1, -2; 3, i64::from(i32::MAX) * 4];
        let wide = widen(&a);
        assert_eq!(wide[(1, 1)], 4.0 * i32::MAX as f64);
        assert_eq!(wide[(0, 1)], -2.0);

        let b: na::DMatrix<f32> = dmatrix![0.5f32; 0.25];
        assert_eq!(widen(&b), dmatrix![0.5; 0.25]);
    }
}
