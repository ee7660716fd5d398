use std::{env, fs, path::PathBuf, process::Command};

const CONFIG: &str = r#"
[market]
n_outlets = 3
width = 260.0
height = 260.0
location_factor = 0.25
price_margin = 20.0
price_adjustment = 10.0
strategies = ["EDLP", "Dynamic", "random-dynamic"]

[customers]
n_customers = 200
frac_loyal = 0.3
loyal_payment = 35.0
normal_payment = 22.0
distance_weight = 0.4
price_weight = 0.25
experience_weight = 0.13
loyalty_weight = 0.12
loyalty_increase = 20.0
loyalty_decrement = 50.0

[run]
n_steps = 60
n_sims = 2
seed = 1234
"#;

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_marketsim"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    if !output.status.success() {
        let stdout_str = String::from_utf8_lossy(&output.stdout);
        let stderr_str = String::from_utf8_lossy(&output.stderr);
        eprintln!(
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }
    output.status.success()
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    fs::write(test_dir.join("config.toml"), CONFIG).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "sweep"]));
    for run_idx in 0..3 {
        let trajectory = test_dir.join(format!("run-{run_idx:04}/trajectory.msgpack"));
        assert!(trajectory.is_file(), "missing {trajectory:?}");
    }

    assert!(run_bin(&["--sim-dir", test_dir_str, "analyze"]));
    let prices = fs::read_to_string(test_dir.join("prices_over_time.csv"))
        .expect("failed to read prices table");
    let mut lines = prices.lines();
    assert_eq!(
        lines.next(),
        Some("run,step,supermarket_EDLP_0,supermarket_Dynamic_1,supermarket_RandomDynamic_2")
    );
    assert_eq!(lines.count(), 3 * 60);
    for name in [
        "customers_over_time.csv",
        "counted_customers_over_time.csv",
        "profits_over_time.csv",
        "summary.csv",
    ] {
        assert!(test_dir.join(name).is_file(), "missing {name}");
    }

    assert!(run_bin(&["--sim-dir", test_dir_str, "clean"]));
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("summary.csv").exists());
    assert!(!test_dir.join("counted_customers_over_time.csv").exists());
    assert!(test_dir.join("config.toml").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    let config = CONFIG.replace(r#""random-dynamic""#, r#""HiLo""#);
    fs::write(test_dir.join("config.toml"), config).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(!run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
