//! Tests for the eroder component bound to a field store.

use approx::assert_relative_eq;
use engine::fields::names;
use engine::{FloodedNodes, NodeFields, OutletPolicy, SedDepConfig, SedDepEroder, SedFluxError};

/// Straight six-node channel draining to node 5, unit spacing, 1 m drop per link.
fn channel() -> NodeFields {
    let mut f = NodeFields::new(6);
    f.add_scalar(names::ELEVATION, vec![5.0, 4.0, 3.0, 2.0, 1.0, 0.0]).unwrap();
    f.add_index(names::RECEIVER, vec![1, 2, 3, 4, 5, 5]).unwrap();
    f.add_index(names::UPSTREAM_ORDER, (0..6).collect()).unwrap();
    f.add_scalar(names::DRAINAGE_AREA, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    f.add_scalar(names::STEEPEST_SLOPE, vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0]).unwrap();
    f.add_scalar(names::LINK_LENGTH, vec![1.0; 6]).unwrap();
    f.add_scalar(names::CELL_AREA, vec![1.0; 6]).unwrap();
    f.flow_director = Some("FlowDirectorSteepest".to_string());
    f
}

fn stream_power_config() -> SedDepConfig {
    SedDepConfig {
        sed_dependency_type: "None".to_string(),
        k_sp: 1.0e-6,
        m_sp: 1.0,
        n_sp: 1.0,
        k_t: 1.0e10,
        ..Default::default()
    }
}

#[test]
fn detachment_limited_channel_lowers_with_area() {
    let mut fields = channel();
    let z0 = fields.scalar(names::ELEVATION).unwrap().to_vec();
    let mut sde = SedDepEroder::new(&mut fields, stream_power_config()).unwrap();
    let report = sde.run_one_step(&mut fields, 1.0, None).unwrap();

    assert_eq!(report.substeps, 1);
    let z = fields.scalar(names::ELEVATION).unwrap();
    let expected = [1.0, 2.0, 3.0, 4.0, 5.0, 0.0];
    for i in 0..6 {
        assert_relative_eq!((z0[i] - z[i]) * 1.0e6, expected[i], epsilon = 1e-6);
    }
    assert_relative_eq!(report.eroded_volume, 15.0e-6, max_relative = 1e-9);
    assert_relative_eq!(report.exported_volume, 15.0e-6, max_relative = 1e-9);
    assert_eq!(report.deposited_volume, 0.0);
    assert_eq!(report.non_converged, 0);

    let dz = fields.scalar(names::ELEVATION_CHANGE).unwrap();
    assert_relative_eq!(dz[4], -5.0e-6, max_relative = 1e-9);
    assert_eq!(sde.cfl_stats().steps, 1);
}

#[test]
fn step_mass_balance_holds_across_substeps() {
    for closure in ["None", "linear_decline", "almost_parabolic"] {
        for (dt, min_substeps) in [(0.5, 1), (1.0, 2), (2.0, 3)] {
            let mut fields = channel();
            fields.add_scalar(names::SEDIMENT_DEPTH, vec![0.5, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
            let z0 = fields.scalar(names::ELEVATION).unwrap().to_vec();
            let cfg = SedDepConfig {
                sed_dependency_type: closure.to_string(),
                k_sp: 0.1,
                m_sp: 1.0,
                n_sp: 1.0,
                k_t: 1.0,
                m_t: 1.0,
                n_t: 1.0,
                ..Default::default()
            };
            let mut sde = SedDepEroder::new(&mut fields, cfg).unwrap();
            let report = sde.run_one_step(&mut fields, dt, None).unwrap();
            assert!(report.substeps >= min_substeps, "{closure} dt={dt}: {report:?}");

            let z = fields.scalar(names::ELEVATION).unwrap();
            let area = fields.scalar(names::CELL_AREA).unwrap();
            let lost: f64 = (0..6).map(|i| (z0[i] - z[i]) * area[i]).sum();
            assert_relative_eq!(lost, report.exported_volume, max_relative = 1e-9);
            assert_relative_eq!(
                report.eroded_volume - report.deposited_volume,
                report.exported_volume,
                max_relative = 1e-9
            );
            // The seeded store is flushed downstream, never counted twice.
            assert_relative_eq!(report.deposited_volume, -0.5, max_relative = 1e-9);
            assert_eq!(report.supplied_volume, 0.0);
        }
    }
}

#[test]
fn bad_time_steps_are_rejected() {
    let mut fields = channel();
    let mut sde = SedDepEroder::new(&mut fields, stream_power_config()).unwrap();
    for dt in [-1.0, f64::NAN] {
        assert!(matches!(
            sde.run_one_step(&mut fields, dt, None),
            Err(SedFluxError::InvalidParameter(_))
        ));
    }
    assert_eq!(fields.scalar(names::ELEVATION).unwrap(), &[5.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
    assert_eq!(sde.cfl_stats().steps, 0);
}

#[test]
fn writes_every_output_field() {
    let mut fields = channel();
    let mut sde = SedDepEroder::new(&mut fields, stream_power_config()).unwrap();
    sde.run_one_step(&mut fields, 1.0, None).unwrap();
    for name in [
        names::DISCHARGE,
        names::RELATIVE_FLUX,
        names::CAPACITY,
        names::DEPOSITION_RATE,
        names::FLUX_ERROR,
        names::ELEVATION_RATE,
        names::ELEVATION_CHANGE,
        names::SEDIMENT_DEPTH,
    ] {
        assert_eq!(fields.scalar(name).map(<[f64]>::len), Some(6), "{name}");
    }
    assert_eq!(fields.flag(names::TRANSPORT_LIMITED).map(<[bool]>::len), Some(6));
    let q = fields.scalar(names::DISCHARGE).unwrap();
    assert_relative_eq!(q[4], 15.0e-6, max_relative = 1e-9);
}

#[test]
fn reservoir_is_created_then_carried_between_calls() {
    let mut fields = channel();
    assert!(!fields.contains(names::SEDIMENT_DEPTH));
    let mut cfg = stream_power_config();
    cfg.k_sp = 0.0;
    let mut sde = SedDepEroder::new(&mut fields, cfg).unwrap();
    assert_eq!(fields.scalar(names::SEDIMENT_DEPTH).unwrap(), &[0.0; 6]);

    // Pre-existing sediment on a channel that can carry it all away.
    fields.scalar_mut(names::SEDIMENT_DEPTH).unwrap()[0] = 0.5;
    sde.run_one_step(&mut fields, 1.0, None).unwrap();
    assert_eq!(fields.scalar(names::SEDIMENT_DEPTH).unwrap()[0], 0.0);
    let z = fields.scalar(names::ELEVATION).unwrap();
    assert_relative_eq!(z[0], 4.5);
}

#[test]
fn existing_reservoir_is_bound_not_replaced() {
    let mut fields = channel();
    fields.add_scalar(names::SEDIMENT_DEPTH, vec![0.0, 0.0, 0.25, 0.0, 0.0, 0.0]).unwrap();
    SedDepEroder::new(&mut fields, stream_power_config()).unwrap();
    assert_eq!(fields.scalar(names::SEDIMENT_DEPTH).unwrap()[2], 0.25);
}

#[test]
fn flooded_nodes_accept_mask_ids_and_field() {
    let run = |flooded: &FloodedNodes, fields: &mut NodeFields| {
        let mut sde = SedDepEroder::new(fields, stream_power_config()).unwrap();
        sde.run_one_step(fields, 1.0, Some(flooded)).unwrap();
        fields.scalar(names::ELEVATION_RATE).unwrap().to_vec()
    };

    let mut a = channel();
    let by_mask = run(&FloodedNodes::Mask(vec![false, false, true, true, false, false]), &mut a);
    let mut b = channel();
    let by_ids = run(&FloodedNodes::Ids(vec![2, 3]), &mut b);
    let mut c = channel();
    c.add_flag("lake", vec![false, false, true, true, false, false]).unwrap();
    let by_field = run(&FloodedNodes::Field("lake".to_string()), &mut c);

    assert_eq!(by_mask, by_ids);
    assert_eq!(by_mask, by_field);
    assert_eq!(by_mask[2], 0.0);
    assert_eq!(by_mask[3], 0.0);
    assert!(by_mask[1] < 0.0);
}

#[test]
fn bad_flooded_inputs_are_rejected() {
    let mut fields = channel();
    let mut sde = SedDepEroder::new(&mut fields, stream_power_config()).unwrap();
    assert!(matches!(
        sde.run_one_step(&mut fields, 1.0, Some(&FloodedNodes::Field("nope".into()))),
        Err(SedFluxError::UnknownFlagField { .. })
    ));
    assert!(matches!(
        sde.run_one_step(&mut fields, 1.0, Some(&FloodedNodes::Ids(vec![6]))),
        Err(SedFluxError::NodeOutOfRange { node: 6, len: 6 })
    ));
    assert!(matches!(
        sde.run_one_step(&mut fields, 1.0, Some(&FloodedNodes::Mask(vec![true; 2]))),
        Err(SedFluxError::FieldLength { .. })
    ));
}

#[test]
fn missing_fields_name_the_field() {
    for (name, hint) in [
        (names::ELEVATION, "elevation"),
        (names::RECEIVER, "flow router"),
        (names::UPSTREAM_ORDER, "flow router"),
        (names::DRAINAGE_AREA, "flow router"),
        (names::STEEPEST_SLOPE, "flow router"),
        (names::LINK_LENGTH, "flow router"),
        (names::CELL_AREA, "grid"),
    ] {
        let mut fields = channel();
        assert!(fields.remove(name));
        let err = SedDepEroder::new(&mut fields, SedDepConfig::default()).unwrap_err();
        assert!(matches!(err, SedFluxError::MissingField { ref field, .. } if field == name));
        let msg = err.to_string();
        assert!(msg.contains(name) && msg.contains(hint), "{msg}");
    }
}

#[test]
fn routing_methods() {
    for ok in ["D8", "D4", "FlowDirectorD8", "FlowDirectorSteepest", "steepest"] {
        let mut fields = channel();
        fields.flow_director = Some(ok.to_string());
        assert!(SedDepEroder::new(&mut fields, SedDepConfig::default()).is_ok(), "{ok}");
    }
    for bad in ["FlowDirectorMFD", "MFD", "FlowDirectorDINF", "whatever"] {
        let mut fields = channel();
        fields.flow_director = Some(bad.to_string());
        assert!(matches!(
            SedDepEroder::new(&mut fields, SedDepConfig::default()),
            Err(SedFluxError::UnsupportedRouting { ref method }) if method == bad
        ));
    }
    let mut fields = channel();
    fields.flow_director = None;
    assert!(SedDepEroder::new(&mut fields, SedDepConfig::default()).is_ok());
}

#[test]
fn configuration_errors_fail_at_construction() {
    let build = |cfg: SedDepConfig| {
        let mut fields = channel();
        let err = SedDepEroder::new(&mut fields, cfg).unwrap_err();
        // Nothing was bound on failure.
        assert!(!fields.contains(names::SEDIMENT_DEPTH));
        err
    };

    let err = build(SedDepConfig { sed_dependency_type: "bad_term".into(), ..Default::default() });
    assert!(matches!(err, SedFluxError::UnknownClosure { .. }));
    for bad in ["MPM", "Voller_generalized", "bad_name"] {
        let err = build(SedDepConfig { transport_law: bad.into(), ..Default::default() });
        assert!(matches!(err, SedFluxError::UnknownTransportLaw { ref name } if name == bad));
    }
    let err = build(SedDepConfig { erosion_law: "bad_name".into(), ..Default::default() });
    assert!(matches!(err, SedFluxError::UnknownErosionLaw { .. }));
    let err = build(SedDepConfig { porosity: 0.0, ..Default::default() });
    assert!(matches!(err, SedFluxError::InvalidParameter(_)));
    let err = build(SedDepConfig { pseudoimplicit_repeats: 0, ..Default::default() });
    assert!(matches!(err, SedFluxError::InvalidParameter(_)));
}

#[test]
fn closure_family_is_selected_by_name() {
    let mut fields = channel();
    let sde = SedDepEroder::new(&mut fields, SedDepConfig::default()).unwrap();
    let hump = sde.closure().hump().unwrap();
    assert_relative_eq!(hump.norm, 1.000_027_804_137_3, max_relative = 1e-12);

    let mut fields = channel();
    let cfg = SedDepConfig { sed_dependency_type: "almost_parabolic".into(), ..Default::default() };
    let sde = SedDepEroder::new(&mut fields, cfg).unwrap();
    assert!(sde.closure().hump().is_none());
    assert_relative_eq!(sde.closure().eval(0.0), 0.1);
}

#[test]
fn base_level_outlet_is_fixed() {
    let mut fields = channel();
    fields.scalar_mut(names::STEEPEST_SLOPE).unwrap()[5] = 1.0;
    let cfg = SedDepConfig { outlet_policy: OutletPolicy::BaseLevel, ..stream_power_config() };
    let mut sde = SedDepEroder::new(&mut fields, cfg).unwrap();
    sde.run_one_step(&mut fields, 1.0, None).unwrap();
    assert_eq!(fields.scalar(names::ELEVATION).unwrap()[5], 0.0);
}

#[test]
fn rerouting_between_calls_is_picked_up() {
    let mut fields = channel();
    let mut sde = SedDepEroder::new(&mut fields, stream_power_config()).unwrap();
    sde.run_one_step(&mut fields, 1.0, None).unwrap();
    // Break the order so node 4 comes first: the rebuilt network must reject it.
    fields.add_index(names::UPSTREAM_ORDER, vec![4, 0, 1, 2, 3, 5]).unwrap();
    assert!(matches!(
        sde.run_one_step(&mut fields, 1.0, None),
        Err(SedFluxError::InvalidNetwork(_))
    ));
}
