//! Teacher parameter EMA update.

use candle_nn::VarMap;
use kinetic_core::{Error, Result};

/// Move every teacher parameter toward its student counterpart:
/// `teacher = momentum * teacher + (1 - momentum) * student`, matched by
/// variable name. No gradient is tracked; must run only after the
/// optimizer step has committed, never concurrently with it.
pub fn ema_update(student: &VarMap, teacher: &VarMap, momentum: f64) -> Result<()> {
    let student_vars = student.data().lock().unwrap();
    let teacher_vars = teacher.data().lock().unwrap();

    for (name, teacher_var) in teacher_vars.iter() {
        let student_var = student_vars.get(name).ok_or_else(|| {
            Error::Config(format!("teacher parameter '{}' has no student counterpart", name))
        })?;
        let updated = ((teacher_var.as_tensor() * momentum)?
            + (student_var.as_tensor().detach() * (1.0 - momentum))?)?;
        teacher_var.set(&updated)?;
    }
    Ok(())
}

/// Copy student weights into the teacher; the two networks start
/// identical and only the EMA moves the teacher afterwards.
pub fn init_teacher_from_student(student: &VarMap, teacher: &VarMap) -> Result<()> {
    ema_update(student, teacher, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};

    fn varmap_with(name: &str, value: f32) -> VarMap {
        let varmap = VarMap::new();
        varmap
            .get((2, 2), name, candle_nn::init::ZERO, DType::F32, &Device::Cpu)
            .unwrap();
        let data = varmap.data().lock().unwrap();
        let var = data.get(name).unwrap();
        var.set(&Tensor::full(value, (2, 2), &Device::Cpu).unwrap())
            .unwrap();
        drop(data);
        varmap
    }

    fn value_of(varmap: &VarMap, name: &str) -> f32 {
        let data = varmap.data().lock().unwrap();
        let t = data.get(name).unwrap().as_tensor().clone();
        drop(data);
        t.flatten_all().unwrap().to_vec1::<f32>().unwrap()[0]
    }

    #[test]
    fn ema_moves_teacher_toward_student() -> Result<()> {
        let student = varmap_with("w", 1.0);
        let teacher = varmap_with("w", 0.0);

        ema_update(&student, &teacher, 0.9)?;
        assert!((value_of(&teacher, "w") - 0.1).abs() < 1e-6);

        ema_update(&student, &teacher, 0.9)?;
        assert!((value_of(&teacher, "w") - 0.19).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn init_copies_student_exactly() -> Result<()> {
        let student = varmap_with("w", 0.37);
        let teacher = varmap_with("w", -5.0);
        init_teacher_from_student(&student, &teacher)?;
        assert!((value_of(&teacher, "w") - 0.37).abs() < 1e-7);
        Ok(())
    }

    #[test]
    fn missing_student_parameter_is_an_error() {
        let student = varmap_with("a", 1.0);
        let teacher = varmap_with("b", 1.0);
        assert!(ema_update(&student, &teacher, 0.9).is_err());
    }
}
