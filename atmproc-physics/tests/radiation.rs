mod common;

use atmproc_core::comm::Comm;
use atmproc_core::errors::AtmError;
use atmproc_core::field::Real;
use atmproc_core::parameters::ParameterList;
use atmproc_physics::constants::STEBOL;
use atmproc_physics::Rrtmgp;
use common::Standalone;

const NCOL: usize = 3;
const NLEV: usize = 4;

fn gases() -> ParameterList {
    ParameterList::new().with("active_gases", vec!["h2o", "co2"])
}

/// Columns from night to overhead sun with a liquid cloud in the second layer.
fn rrtmgp() -> Standalone<Rrtmgp> {
    let mut process = Standalone::new(Rrtmgp::new(Comm::serial(), gases()), NCOL, NLEV, None);
    process.start().unwrap();

    let p_int: Vec<Real> = (0..NCOL * (NLEV + 1))
        .map(|i| 1000.0 + 25000.0 * (i % (NLEV + 1)) as Real)
        .collect();
    let p_mid: Vec<Real> = (0..NCOL * NLEV)
        .map(|i| 13500.0 + 25000.0 * (i % NLEV) as Real)
        .collect();
    let gas_vmr: Vec<Real> = (0..NCOL * NLEV).flat_map(|_| [5e-3, 4e-4]).collect();
    let lwp: Vec<Real> = (0..NCOL * NLEV)
        .map(|i| if i % NLEV == 1 { 0.05 } else { 0.0 })
        .collect();

    process.set("p_int", &p_int);
    process.set("p_mid", &p_mid);
    process.fill("T_mid", 260.0);
    process.fill("T_int", 260.0);
    process.set("gas_vmr", &gas_vmr);
    process.fill("surf_alb_direct", 0.2);
    process.fill("surf_alb_diffuse", 0.3);
    process.set("cos_zenith", &[-0.5, 0.5, 1.0]);
    process.set("lwp", &lwp);
    process.fill("iwp", 0.0);
    process.fill("eff_radius_qc", 10.0);
    process.fill("eff_radius_qi", 25.0);
    process
}

fn column(values: &[Real], icol: usize) -> &[Real] {
    &values[icol * (NLEV + 1)..(icol + 1) * (NLEV + 1)]
}

#[test]
fn test_fluxes() {
    let mut process = rrtmgp();
    process.process.run(3600.0).unwrap();

    let sw_dn = process.get("SW_flux_dn");
    let sw_dir = process.get("SW_flux_dn_dir");
    let sw_up = process.get("SW_flux_up");
    let lw_up = process.get("LW_flux_up");
    let lw_dn = process.get("LW_flux_dn");

    for flux in [&sw_dn, &sw_dir, &sw_up, &lw_up, &lw_dn] {
        assert_eq!(flux.len(), NCOL * (NLEV + 1));
        assert!(flux.iter().all(|&f| f >= 0.0));
    }

    // Night
    assert!(column(&sw_dn, 0).iter().all(|&f| f == 0.0));
    // Top of atmosphere irradiance follows the solar zenith angle
    let solar_constant = 1360.9;
    assert_eq!(column(&sw_dn, 1)[0], 0.5 * solar_constant);
    assert_eq!(column(&sw_dn, 2)[0], solar_constant);
    // More light reaches the surface with the sun overhead
    assert!(column(&sw_dn, 2)[NLEV] > column(&sw_dn, 1)[NLEV]);
    // The cloud converts the direct beam into diffuse light
    assert!(column(&sw_dir, 2)[2] < 0.1 * column(&sw_dir, 2)[1]);
    assert!(column(&sw_dn, 2)[2] > column(&sw_dir, 2)[2]);

    // No longwave enters from space, the surface emits as a black body
    assert!(column(&lw_dn, 0)[0] == 0.0);
    let surface = STEBOL * 260.0_f64.powi(4);
    assert!((column(&lw_up, 0)[NLEV] - surface).abs() < 1e-9 * surface);
    // Isothermal atmosphere: upwelling longwave is the same at every level
    assert!(column(&lw_up, 0).iter().all(|&f| (f - surface).abs() < 1e-9 * surface));
}

#[test]
fn test_gas_table_lifecycle() {
    let mut process = Standalone::new(Rrtmgp::new(Comm::serial(), gases()), NCOL, NLEV, None);
    assert!(process.process.process().gas_names().is_none());

    process.start().unwrap();
    assert_eq!(
        process.process.process().gas_names().unwrap(),
        &["h2o".to_string(), "co2".to_string()]
    );

    process.process.finalize().unwrap();
    assert!(process.process.process().gas_names().is_none());
}

#[test]
fn test_padded_fields_are_rejected() {
    let mut process = Standalone::new(Rrtmgp::new(Comm::serial(), gases()), NCOL, NLEV, Some(8));
    match process.bind().unwrap_err() {
        AtmError::IncompatibleField {
            process: name,
            reason,
            ..
        } => {
            assert_eq!(name, "rrtmgp");
            assert!(reason.contains("padded"));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_unknown_gas_is_a_setup_error() {
    let grids = atmproc_core::grid::LibraryGridsManager::with_point_grid(
        atmproc_physics::PHYSICS_GRID,
        NCOL,
        NLEV,
    )
    .unwrap();
    let params = ParameterList::new().with("active_gases", vec!["h2o", "unobtainium"]);
    let mut process =
        atmproc_core::process::ManagedProcess::new(Rrtmgp::new(Comm::serial(), params));
    let err = process.set_grids(&grids).unwrap_err();
    assert!(err.is_setup_error());
    assert!(err.to_string().contains("unobtainium"));
}
