fn main() -> Result<(), Box<dyn std::error::Error>> {
    jarvis::cli::main()
}
