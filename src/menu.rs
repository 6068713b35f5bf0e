use std::io::{self, Write};

pub fn show_menu() {
    println!("\n===========================================");
    println!("PID Control Loop");
    println!("===========================================");
    println!("Select an option:");
    println!("1. Threaded Loop Demo");
    println!("2. Async Loop Demo");
    println!("3. Comparison (Async vs Threaded)");
    println!("4. Manual / Hold Walkthrough");
    println!("5. Exit");
    println!("===========================================");
    print!("Choice (1-5): ");
    let _ = io::stdout().flush();
}

pub fn get_user_choice() -> io::Result<u32> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    input
        .trim()
        .parse::<u32>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

pub fn wait_for_enter() {
    println!("\nPress Enter to return to menu...");
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);
}
