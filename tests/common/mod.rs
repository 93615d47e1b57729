use lqg_rs::control::model::StateSpaceModel;
use nalgebra as na;

/// Zero-order-hold discretization `(Phi, Gamma)` of a continuous model,
/// taken from the exponential of `[A, B; 0, 0] * dt`.
pub fn zero_order_hold(
    model: &impl StateSpaceModel,
    dt: f64,
) -> (na::DMatrix<f64>, na::DMatrix<f64>) {
    let n = model.get_mat_a().nrows();
    let m = model.get_mat_b().ncols();
    let mut mat_m = na::DMatrix::<f64>::zeros(n + m, n + m);
    mat_m.view_mut((0, 0), (n, n)).copy_from(model.get_mat_a());
    mat_m.view_mut((0, n), (n, m)).copy_from(model.get_mat_b());
    let mat_e = (mat_m * dt).exp();
    (
        mat_e.view((0, 0), (n, n)).into_owned(),
        mat_e.view((0, n), (n, m)).into_owned(),
    )
}

/// Propagates `x+ = Phi x + Gamma u`, `y = C x + D u` for every column of `mat_u`.
pub fn system_simulate(
    model: &impl StateSpaceModel,
    mat_phi: &na::DMatrix<f64>,
    mat_gamma: &na::DMatrix<f64>,
    mat_u: &na::DMatrix<f64>,
    x0: &na::DVector<f64>,
) -> (na::DMatrix<f64>, na::DMatrix<f64>) {
    let sim_time = mat_u.ncols();
    let n_state = mat_phi.nrows();
    let n_output = model.get_mat_c().nrows();
    let mut mat_x = na::DMatrix::<f64>::zeros(n_state, sim_time + 1);
    let mut mat_y = na::DMatrix::<f64>::zeros(n_output, sim_time);
    mat_x.column_mut(0).copy_from(x0);
    for i in 0..sim_time {
        let x_k = mat_x.column(i).into_owned();
        let u_k = mat_u.column(i).into_owned();
        mat_y
            .column_mut(i)
            .copy_from(&(model.get_mat_c() * &x_k + model.get_mat_d() * &u_k));
        mat_x
            .column_mut(i + 1)
            .copy_from(&(mat_phi * &x_k + mat_gamma * &u_k));
    }

    (mat_y, mat_x)
}

pub fn max_real_part(mat: &na::DMatrix<f64>) -> f64 {
    mat.complex_eigenvalues()
        .iter()
        .map(|e| e.re)
        .fold(f64::NEG_INFINITY, f64::max)
}
