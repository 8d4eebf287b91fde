use aviv_core::domain::{
    AvivErrorCategory, ChannelRole, ExperimentType, Instrument, ParamValue, ParameterBundle, PipelineStage,
};
use aviv_core::{ExperimentDispatcher, ProcessOptions, Series, preview, process_file};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CD_TITRATION: &str = "\
Aviv CD instrument file
EXPERIMENT TYPE: Titration
$CDHV: 412.0
$CONFIG
$EXPNAME:gdn_titration
$MONOWL:222.0
$MONOBW:1.0
$CONCSYRTITRANT:8.0
$CONCINITTITRANT:0.0
$CONCCELLVOL:2000.0
$MDCDA
X CD_Signal CD_Error Samp._Conc. Inj._Vol._ul.
0.0 -10.0 0.2 1.0 0.0
1.0 -8.1 0.2 0.9 222.2
2.0 -6.4 0.2 0.8 277.8
$ENDDA
";

const ATF_TITRATION: &str = "\
Aviv ATF instrument file
EXPERIMENT TYPE: Titration
$PMTHV: 700
$CONFIG
$EXPNAME:atf_titration
$EXWL:280.0
$EMWL:340.0
$TEMPSP:25.0
$TEMPREFSP:25.0
$MDCDA
X Samp._PMT_Raw_Sig. Ref._PMT_Raw_Sig. QC_Signal PMT_Signal_(Dark) Samp._Conc. Inj._Vol._ul.
0.0 10.0 4.0 1.0 0.0 1.0 0.0
1.0 12.0 5.0 1.0 0.0 0.9 222.2
2.0 15.0 6.0 1.0 0.0 0.8 277.8
$ENDDA
";

const ATF_SPECTRUM: &str = "\
Aviv ATF instrument file
EXPERIMENT TYPE: Wavelength
$PMTHV: 700
$CONFIG
$EXPNAME:emission
$MDCDA
X Samp._PMT_Raw_Sig.
300.0 1.0
310.0 2.0
$ENDDA
";

fn cd_spectrum(wavelengths: &[f64], signals: &[f64]) -> String {
    let mut source = String::from(
        "Aviv CD instrument file\nEXPERIMENT TYPE: Wavelength\n$CDHV: 400.0\n$CONFIG\n$EXPNAME:spectrum\n$MDCDA\nX CD_Signal CD_Error\n",
    );
    for (wavelength, signal) in wavelengths.iter().zip(signals) {
        source.push_str(&format!("{wavelength} {signal} 0.1\n"));
    }
    source.push_str("$ENDDA\n");
    source
}

fn stage_file(root: &Path, name: &str, source: &str) -> PathBuf {
    let path = root.join(name);
    fs::write(&path, source).expect("fixture should be written");
    path
}

fn protein_params() -> ParameterBundle {
    ParameterBundle::new()
        .with("num_residues", ParamValue::Int(129))
        .with("molec_weight", ParamValue::Float(14300.0))
        .with("protein_conc", ParamValue::Float(40.0))
        .with("path_length", ParamValue::Float(0.1))
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "length differs: {actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "expected {expected:?}, got {actual:?}");
    }
}

#[test]
fn cd_titration_with_zero_blanks_divides_by_concentration() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = stage_file(temp.path(), "titration.dat", CD_TITRATION);
    let params = protein_params()
        .with("sam_buf", ParamValue::Float(0.0))
        .with("sam_titr", ParamValue::Float(0.0));

    let processed = process_file(&path, &params, &ProcessOptions::default()).expect("titration processes");
    assert_eq!(processed.channels().len(), 1);

    let channel = &processed.channels()[0];
    assert_close(channel.raw_signal(), &[-10.0, -8.1, -6.4]);
    assert_close(
        channel
            .series(Series::TitrantBlankCorrected)
            .expect("blank step recorded"),
        &[-10.0, -8.1, -6.4],
    );
    assert_close(
        channel.series(Series::DilutionCorrected).expect("dilution step recorded"),
        &[-10.0, -9.0, -8.0],
    );

    let normalized = channel.series(Series::Normalized).expect("normalized");
    assert_close(normalized, &[1.0, 0.5, 0.0]);

    let output = processed.output();
    assert!(output.contains("# Name: gdn_titration\n"));
    assert!(output.contains("Titrant Blank Correction:"));
    assert!(output.contains("Corrected signal for dilution"));
}

#[test]
fn atf_sample_only_yields_one_sample_channel() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = stage_file(temp.path(), "atf.dat", ATF_TITRATION);
    let params = ParameterBundle::new()
        .with("sample", ParamValue::Bool(true))
        .with("sam_buf", ParamValue::Float(0.0))
        .with("sam_titr", ParamValue::Float(0.0));

    let processed = process_file(&path, &params, &ProcessOptions::default()).expect("atf titration processes");
    assert_eq!(processed.channels().len(), 1);
    assert_eq!(processed.channels()[0].role(), ChannelRole::Sample);
    assert_eq!(processed.channels()[0].name(), "sample");
    assert!(!processed.table().contains("r_x"));
}

#[test]
fn atf_with_no_channels_enabled_is_a_configuration_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = stage_file(temp.path(), "atf.dat", ATF_TITRATION);
    let params = ParameterBundle::new()
        .with("sample", ParamValue::Bool(false))
        .with("reference", ParamValue::Bool(false));

    let error = process_file(&path, &params, &ProcessOptions::default()).expect_err("no channels should fail");
    assert_eq!(error.category(), AvivErrorCategory::Configuration);
    assert_eq!(error.exit_code(), 3);
}

#[test]
fn atf_wavelength_scan_is_unsupported() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = stage_file(temp.path(), "spectrum.dat", ATF_SPECTRUM);

    let error = process_file(&path, &ParameterBundle::new(), &ProcessOptions::default())
        .expect_err("atf wavelength has no route");
    assert_eq!(error.category(), AvivErrorCategory::Unsupported);
    assert_eq!(error.exit_code(), 4);

    let error = ExperimentDispatcher::new(&path, Instrument::Atf, ExperimentType::Wavelength)
        .expect_err("explicit combination is rejected too");
    assert_eq!(error.category(), AvivErrorCategory::Unsupported);
}

#[test]
fn blank_with_different_wavelengths_is_a_format_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let sample = stage_file(
        temp.path(),
        "sample.dat",
        &cd_spectrum(&[200.0, 210.0, 220.0], &[-5.0, -8.0, -3.0]),
    );
    let blank = stage_file(temp.path(), "blank.dat", &cd_spectrum(&[200.0, 210.0], &[-0.5, -0.4]));
    let params = protein_params().with("blank_file", ParamValue::Text(blank.display().to_string()));

    let mut dispatcher = ExperimentDispatcher::for_file(&sample).expect("file identified");
    let error = dispatcher
        .process(&params, &ProcessOptions::default())
        .expect_err("mismatched blank should fail");
    assert_eq!(error.category(), AvivErrorCategory::Format);
    assert_eq!(error.code(), "FORMAT.BLANK_MISMATCH");
    assert_eq!(error.stage(), Some(PipelineStage::Corrected));
    assert_eq!(dispatcher.stage(), PipelineStage::Failed);
}

#[test]
fn matching_blank_is_subtracted_before_mme() {
    let temp = TempDir::new().expect("tempdir should be created");
    let sample = stage_file(
        temp.path(),
        "sample.dat",
        &cd_spectrum(&[200.0, 210.0, 220.0], &[-5.0, -8.0, -3.0]),
    );
    let blank = stage_file(
        temp.path(),
        "blank.dat",
        &cd_spectrum(&[200.0, 210.0, 220.0], &[-1.0, -1.0, -1.0]),
    );
    let params = protein_params().with("blank_file", ParamValue::Text(blank.display().to_string()));

    let processed = process_file(&sample, &params, &ProcessOptions::default()).expect("spectrum processes");
    let channel = &processed.channels()[0];
    assert_close(channel.series(Series::Blanked).expect("blank recorded"), &[-4.0, -7.0, -2.0]);
    assert!(channel.series(Series::Normalized).is_none());
    assert!(processed.output().contains("Removed blank"));
}

#[test]
fn identify_reports_atf_configuration_without_parameters() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = stage_file(temp.path(), "atf.dat", ATF_TITRATION);

    let previewed = preview(&path).expect("preview runs");
    assert_eq!(previewed.descriptor.instrument, Instrument::Atf);
    assert_eq!(previewed.descriptor.experiment, "Titration");
    assert_eq!(previewed.channels.len(), 2);
    assert_eq!(previewed.config.float("excitation_wavelength"), Some(280.0));
}
