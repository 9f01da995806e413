use atmproc::atmproc_core::comm::Comm;
use atmproc::atmproc_core::errors::AtmError;
use atmproc::atmproc_core::grid::{GridsManager, LibraryGridsManager};
use atmproc::atmproc_core::io::{IcVariable, InitialConditions};
use atmproc::atmproc_core::parameters::ParameterList;
use atmproc::atmproc_core::process::ProcessState;
use atmproc::atmproc_physics::{CldFraction, Rrtmgp, PHYSICS_GRID};
use atmproc::ProcessHarness;
use is_close::is_close;
use std::path::Path;
use std::sync::Arc;

fn grids(ncols: usize, nlevs: usize) -> Arc<dyn GridsManager> {
    Arc::new(LibraryGridsManager::with_point_grid(PHYSICS_GRID, ncols, nlevs).unwrap())
}

fn cld_fraction() -> ProcessHarness {
    let process = CldFraction::new(Comm::serial(), ParameterList::new());
    let mut harness = ProcessHarness::new(process, grids(3, 1)).unwrap();
    harness.create_fields().unwrap();
    harness.set_fields().unwrap();
    harness
}

fn write_ic(dir: &Path, variables: &[(&str, Vec<f64>)]) -> std::path::PathBuf {
    let mut ic = InitialConditions::new();
    for (name, data) in variables {
        let var = IcVariable::new(
            vec!["ncol".to_string(), "lev".to_string()],
            vec![3, 1],
            data.clone(),
        )
        .unwrap();
        ic.insert(*name, var).unwrap();
    }
    let path = dir.join("ic.toml");
    ic.write_file(&path).unwrap();
    path
}

#[test]
fn test_cloud_fraction_from_initial_conditions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ic(
        dir.path(),
        &[
            ("qi", vec![0.0, 0.0, 0.002]),
            ("cldfrac_liq", vec![0.0, 0.5, 0.9]),
        ],
    );

    let mut harness = cld_fraction();
    harness.initialize("2000-01-01-00000").unwrap();
    assert!(harness.read_ic(&path).unwrap().is_empty());
    harness.run(1800.0).unwrap();

    let liq = harness.get_arr("cldfrac_liq").unwrap();
    let ice = harness.get_arr("cldfrac_ice").unwrap();
    let tot = harness.get_arr("cldfrac_tot").unwrap();
    assert_eq!(ice.shape(), &[3, 1]);
    assert_eq!(ice[[0, 0]], 0.0);
    assert!(ice[[2, 0]] > 0.0);
    for ((&t, &l), &i) in tot.iter().zip(liq.iter()).zip(ice.iter()) {
        assert!(t >= l.max(i));
        assert!((0.0..=1.0).contains(&t));
    }
    assert_eq!(
        harness.time_stamp().unwrap().to_string(),
        "2000-01-01-01800"
    );
}

#[test]
fn test_read_ic_reports_missing_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ic(dir.path(), &[("qi", vec![0.0, 1e-3, 0.0])]);

    let mut harness = cld_fraction();
    harness.initialize("2000-01-01-00000").unwrap();
    assert_eq!(harness.read_ic(&path).unwrap(), vec!["cldfrac_liq".to_string()]);
    assert!(is_close!(harness.get_arr("qi").unwrap().sum(), 1e-3));
}

#[test]
fn test_timestep_validity() {
    let mut harness = cld_fraction();
    harness.initialize("2000-01-01-00000").unwrap();

    for dt in [-1.0, 0.0] {
        assert!(matches!(
            harness.run(dt),
            Err(AtmError::InvalidTimestep { .. })
        ));
    }
    harness.run(1800.0).unwrap();
    assert_eq!(harness.process().num_steps(), 1);
}

#[test]
fn test_consecutive_runs_are_bit_identical() {
    let mut harness = cld_fraction();
    harness.initialize("2000-01-01-00000").unwrap();
    harness.set_arr("qi", &[1e-13, 3e-6, 0.01]).unwrap();
    harness.set_arr("cldfrac_liq", &[0.1, 0.2, 0.3]).unwrap();

    let outputs = |harness: &ProcessHarness| {
        [
            "cldfrac_ice",
            "cldfrac_tot",
            "cldfrac_ice_for_output",
            "cldfrac_tot_for_output",
        ]
        .map(|name| harness.get_arr(name).unwrap())
    };
    harness.run(1800.0).unwrap();
    let first = outputs(&harness);
    harness.run(1800.0).unwrap();
    assert_eq!(first, outputs(&harness));
}

#[test]
fn test_run_before_buffers_is_a_setup_error() {
    let mut harness = cld_fraction();
    assert_eq!(harness.process().state(), ProcessState::FieldsBound);
    assert!(matches!(
        harness.run(1800.0),
        Err(AtmError::InvalidLifecycle { .. })
    ));
}

#[test]
fn test_padded_fields_rejected() {
    let process = Rrtmgp::new(Comm::serial(), ParameterList::new());
    let mut harness = ProcessHarness::new(process, grids(2, 3)).unwrap();
    harness.create_fields_with_pack_size(4).unwrap();
    assert!(matches!(
        harness.set_fields(),
        Err(AtmError::IncompatibleField { .. })
    ));
}

#[test]
fn test_unknown_field_lists_available() {
    let harness = cld_fraction();
    let err = harness.get_arr("qc").unwrap_err();
    assert!(matches!(err, AtmError::FieldNotFound { .. }));
    let message = err.to_string();
    assert!(message.contains("cldfrac_liq"));
    assert!(message.contains("qi"));
}

#[test]
fn test_set_fields_requires_created_fields() {
    let process = CldFraction::new(Comm::serial(), ParameterList::new());
    let mut harness = ProcessHarness::new(process, grids(3, 1)).unwrap();
    assert!(harness.set_fields().is_err());
}
