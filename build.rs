fn main() {
    println!("cargo:rerun-if-env-changed=VALVE_CONFIG");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
