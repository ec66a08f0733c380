fn main() -> anyhow::Result<()> {
    alert_filters::run()
}
