use ml::{collect_grads, Adam, Tape, Tensor};
use std::collections::HashMap;

fn quadratic_grad(p: &mut Tensor, target: &[f64]) {
    let t = Tensor::from_vec(vec![target.len()], target.to_vec());
    let mut tape = Tape::new();
    let mut tensors = HashMap::new();
    let d = p.sub(&t, &mut tape, &mut tensors);
    let sq = d.pow(2.0, &mut tape, &mut tensors);
    let loss = sq.reduce_sum(&mut tape, &mut tensors);
    tape.backward(&loss, &mut tensors).unwrap();
    collect_grads(&tensors, &mut [p]);
}

#[test]
fn adam_minimizes_quadratic() {
    let target = [1.5, -2.0, 0.25];
    let mut p = Tensor::zeros(vec![3]).with_grad();
    let mut adam = Adam::new(&[&p]).with_lr(0.05);
    for _ in 0..2000 {
        quadratic_grad(&mut p, &target);
        adam.step(&mut [&mut p]);
    }
    for (v, t) in p.data.iter().zip(target) {
        assert!((v - t).abs() < 1e-2, "{v} vs {t}");
    }
}

#[test]
fn step_skips_params_without_grad() {
    let mut p = Tensor::from_vec(vec![1], vec![4.0]).with_grad();
    let mut adam = Adam::new(&[&p]);
    adam.step(&mut [&mut p]);
    assert_eq!(p.data, vec![4.0]);
}
