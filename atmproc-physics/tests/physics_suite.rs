//! The three physics processes coupled through a driver built from a
//! configuration file.

use atmproc_core::comm::Comm;
use atmproc_core::driver::{AtmosphereDriver, DriverBuilder, DriverConfig, ProcessFactory};
use atmproc_core::field::tags::{COL, ILEV, LEV, NGAS, SWBND};
use atmproc_core::field::{FieldLayout, Real};
use atmproc_core::io::{IcVariable, InitialConditions};
use atmproc_core::process::RunType;
use atmproc_physics::register_physics;
use std::fs;

const NCOL: usize = 2;
const NLEV: usize = 3;

const CONFIG: &str = r#"
external_inputs = ["cos_zenith"]
initial_conditions = "ic.toml"

[grid]
num_columns = 2
num_levels = 3

[[processes]]
type = "rrtmgp"
[processes.parameters]
active_gases = ["h2o", "co2"]
num_sw_bands = 2

[[processes]]
type = "cld_fraction"

[[processes]]
type = "p3"
[processes.parameters]
autoconversion_rate = 2e-3

[[checks]]
process = "cld_fraction"
field = "cldfrac_tot"
check = { type = "FieldNaNCheck" }
"#;

/// Repeat one column profile for every column.
fn columns(profile: &[Real]) -> Vec<Real> {
    profile.repeat(NCOL)
}

fn initial_conditions() -> InitialConditions {
    let mid = FieldLayout::new(&[COL, LEV], &[NCOL, NLEV]).unwrap();
    let int = FieldLayout::new(&[COL, ILEV], &[NCOL, NLEV + 1]).unwrap();
    let band = FieldLayout::new(&[COL, SWBND], &[NCOL, 2]).unwrap();
    let gas = FieldLayout::new(&[COL, LEV, NGAS], &[NCOL, NLEV, 2]).unwrap();

    let mut ic = InitialConditions::new();
    let mut insert = |name: &str, layout: &FieldLayout, data: Vec<Real>| {
        ic.insert(name, IcVariable::from_layout(layout, data).unwrap())
            .unwrap();
    };
    insert("p_int", &int, columns(&[1000.0, 34000.0, 67000.0, 100000.0]));
    insert("p_mid", &mid, columns(&[17500.0, 50500.0, 83500.0]));
    insert("pseudo_density", &mid, columns(&[33000.0; 3]));
    insert("T_mid", &mid, columns(&[230.0, 260.0, 285.0]));
    insert("T_int", &int, columns(&[220.0, 245.0, 272.0, 290.0]));
    insert("qv", &mid, columns(&[1e-5, 1e-3, 8e-3]));
    insert("qc", &mid, columns(&[0.0, 2e-4, 6e-4]));
    insert("qi", &mid, columns(&[5e-5, 1e-5, 0.0]));
    insert("cldfrac_liq", &mid, columns(&[0.0, 0.4, 0.8]));
    insert("lwp", &mid, columns(&[0.0, 0.02, 0.05]));
    insert("iwp", &mid, columns(&[0.01, 0.002, 0.0]));
    insert("surf_alb_direct", &band, vec![0.15; NCOL * 2]);
    insert("surf_alb_diffuse", &band, vec![0.15; NCOL * 2]);
    insert(
        "gas_vmr",
        &gas,
        columns(&[1e-5, 4e-4, 1e-3, 4e-4, 8e-3, 4e-4]),
    );
    ic
}

fn driver() -> AtmosphereDriver {
    let dir = tempfile::tempdir().unwrap();
    initial_conditions()
        .write_file(dir.path().join("ic.toml"))
        .unwrap();
    let config_path = dir.path().join("atm.toml");
    fs::write(&config_path, CONFIG).unwrap();

    let mut factory = ProcessFactory::new();
    register_physics(&mut factory);
    let config = DriverConfig::from_file(&config_path).unwrap();
    let mut driver = DriverBuilder::from_config(config, &factory, Comm::serial())
        .unwrap()
        .build()
        .unwrap();
    driver
        .initialize("2000-06-01-43200".parse().unwrap(), RunType::Initial)
        .unwrap();
    driver
}

fn values(driver: &AtmosphereDriver, name: &str) -> Vec<Real> {
    driver.get_field(name).unwrap().get_view().to_vec()
}

#[test]
fn test_execution_order() {
    let driver = driver();
    // Microphysics writes the water species and effective radii the others read
    assert_eq!(driver.process_names(), vec!["p3", "rrtmgp", "cld_fraction"]);
    assert_eq!(driver.external_fields().len(), 15);
    assert!(driver.as_dot().to_string().contains("eff_radius_qc"));
}

#[test]
fn test_shared_tracer_storage() {
    let driver = driver();
    let qi = driver.get_field("qi").unwrap();
    // Packed for the cloud fraction, still readable by everyone else
    assert_eq!(qi.pack_size(), 16);
    assert_eq!(values(&driver, "qi"), columns(&[5e-5, 1e-5, 0.0]));

    let providers = qi.tracking().providers().to_vec();
    assert!(providers.contains(&"p3".to_string()));
    assert!(providers.contains(&"initial_conditions".to_string()));
    assert!(qi.tracking().customers().contains(&"cld_fraction".to_string()));
}

#[test]
fn test_steps() {
    let mut driver = driver();
    driver.set_external_input("cos_zenith", &[0.7, 0.0]).unwrap();

    for _ in 0..3 {
        driver.run(300.0).unwrap();
    }

    assert_eq!(driver.num_steps(), 3);
    assert_eq!(driver.time_stamp().unwrap().to_string(), "2000-06-01-44100");
    assert!(driver.tolerated_violations().is_empty());

    let cloud = values(&driver, "cldfrac_tot");
    assert!(cloud.iter().all(|&c| (0.0..=1.0).contains(&c)));
    // The top level holds ice cloud
    assert_eq!(values(&driver, "cldfrac_ice")[0], 1.0);

    let sw_dn = values(&driver, "SW_flux_dn");
    assert!(sw_dn[0] > 0.0);
    // The second column is in the dark
    assert!(sw_dn[NLEV + 1..].iter().all(|&f| f == 0.0));
    assert!(values(&driver, "LW_flux_up").iter().all(|&f| f > 0.0));

    let t = driver.get_field("T_mid").unwrap().time_stamp().unwrap();
    assert_eq!(t, driver.time_stamp().unwrap());

    driver.finalize().unwrap();
    assert!(driver.run(300.0).is_err());
}
